//! One grading run: loader → validator → enrichment → aggregator → assembler.

use tracing::info;

use crate::config::ExamConfig;
use crate::error::Result;
use crate::grading::aggregate::{AggregateSettings, aggregate};
use crate::grading::enrich::enrich;
use crate::grading::types::{ExamMetadata, StudentResult};
use crate::loader::{Page, load_exam};
use crate::report::{Report, assemble};
use crate::transform::Transform;
use crate::validate::validate;

/// Output of a run, ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradebook {
    pub report: Report,
    pub results: Vec<StudentResult>,
}

/// Grades every student found in `pages`.
///
/// Nothing is written here; any error aborts the whole run.
#[tracing::instrument(skip(pages, config, transform), fields(pages = pages.len()))]
pub fn run(
    pages: &[Page],
    exam_name: &str,
    config: &ExamConfig,
    transform: &Transform,
) -> Result<Gradebook> {
    let exam = load_exam(pages, config.scores_header_row)?;
    validate(&exam, config.paper_max)?;

    let enriched = enrich(&exam, config.paper_max)?;
    let aggregated = aggregate(
        &enriched,
        &exam.students,
        &exam.problems,
        transform,
        AggregateSettings {
            full_scale: config.full_scale,
            target_mean: config.target_mean,
            target_std: config.target_std,
        },
    )?;

    let metadata = ExamMetadata {
        exam_name: exam_name.to_string(),
        identity_fields: exam.identity_fields.clone(),
        problems: exam.problems.clone(),
        full_scale: config.full_scale,
        paper_max: config.paper_max,
        max_questions: exam.max_questions,
        target_mean: aggregated.target.mean,
        target_std: aggregated.target.std,
        transformed_mean: aggregated.transformed.mean,
        transformed_std: aggregated.transformed.std,
        class_mean: aggregated.normalized.mean,
        class_std: aggregated.normalized.std,
    };

    let report = assemble(metadata, &exam.scale, &enriched, &aggregated);
    info!(
        students = report.students.len(),
        class_mean = report.metadata.class_mean,
        class_std = report.metadata.class_std,
        "Exam graded"
    );

    Ok(Gradebook {
        report,
        results: aggregated.students,
    })
}
