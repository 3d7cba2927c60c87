//! Per-student report views and their LaTeX rendering.

pub mod assemble;
pub mod latex;

pub use assemble::{Report, StudentReport, assemble};
