pub mod config;
pub mod error;
pub mod grading;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod transform;
pub mod validate;
