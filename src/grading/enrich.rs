use std::collections::HashMap;

use crate::error::{CellRef, GradeError, Result};
use crate::grading::types::{EnrichedScore, QuestionKey};
use crate::grading::utility::mean;
use crate::loader::LoadedExam;

/// Per-student scores joined with the scale, along with the class-wide
/// success rate of every question.
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched {
    pub scores: Vec<EnrichedScore>,
    pub class_success: HashMap<QuestionKey, f64>,
}

/// Joins validated scores with the scale.
///
/// Pass 1 computes each student's success ratio and weighted points; pass 2
/// averages the success ratios per question across the class and writes the
/// result back onto every score of that question.
#[tracing::instrument(skip_all, fields(scores = exam.scores.len()))]
pub fn enrich(exam: &LoadedExam, paper_max: f64) -> Result<Enriched> {
    let mut scores = Vec::with_capacity(exam.scores.len());
    let mut ratios: HashMap<&QuestionKey, Vec<f64>> = HashMap::new();

    for raw in &exam.scores {
        let max_points = exam
            .scale
            .max_points(&raw.question)
            .ok_or_else(|| GradeError::IncompleteScale(vec![raw.question.clone()]))?;
        let on_paper = raw.points.ok_or_else(|| {
            GradeError::IncompleteScores(vec![CellRef {
                student: raw.student.clone(),
                question: raw.question.clone(),
                value: None,
            }])
        })?;

        let success_ratio = on_paper / paper_max;
        ratios.entry(&raw.question).or_default().push(success_ratio);

        scores.push(EnrichedScore {
            student: raw.student.clone(),
            question: raw.question.clone(),
            max_points,
            on_paper,
            success_ratio,
            weighted: success_ratio * max_points,
            class_success: 0.0,
        });
    }

    let class_success: HashMap<QuestionKey, f64> = ratios
        .into_iter()
        .map(|(key, series)| (key.clone(), mean(&series)))
        .collect();

    for score in &mut scores {
        score.class_success = class_success[&score.question];
    }

    Ok(Enriched {
        scores,
        class_success,
    })
}
