//! Score enrichment, aggregation and ranking.
//!
//! Scores are joined with the scale, rolled up per problem and per student,
//! transformed, rescaled to a target mean/standard deviation and ranked.

pub mod aggregate;
pub mod enrich;
pub mod rank;
pub mod types;
pub mod utility;
