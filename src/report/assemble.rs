use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::grading::aggregate::Aggregated;
use crate::grading::enrich::Enriched;
use crate::grading::types::{EnrichedScore, ExamMetadata, Scale, StudentId};

/// Header block of a student's report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub exam_name: String,
    pub student: StudentId,
    pub rank: usize,
    pub grade: f64,
    pub class_mean: f64,
    pub class_std: f64,
}

/// `problem: earned/total`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemLine {
    pub problem: String,
    pub earned: f64,
    pub total: f64,
}

impl fmt::Display for ProblemLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2}/{}", self.problem, self.earned, self.total)
    }
}

/// One question column of a problem table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRow {
    pub label: String,
    pub scale: f64,
    pub on_paper: f64,
    pub weighted: f64,
    pub class_success: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemTable {
    pub problem: String,
    pub questions: Vec<QuestionRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReport {
    pub header: Header,
    pub synthesis: Vec<ProblemLine>,
    pub tables: Vec<ProblemTable>,
}

/// Everything handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub metadata: ExamMetadata,
    pub students: Vec<StudentReport>,
}

impl Report {
    /// One single-student report per student, in the same order.
    pub fn split(&self) -> Vec<Report> {
        self.students
            .iter()
            .map(|s| Report {
                generated_at: self.generated_at,
                metadata: self.metadata.clone(),
                students: vec![s.clone()],
            })
            .collect()
    }
}

/// Pivots aggregated results into per-student views.
///
/// Tables follow the spreadsheet order: problems in page order, questions in
/// column order.
#[tracing::instrument(skip_all, fields(students = aggregated.students.len()))]
pub fn assemble(
    metadata: ExamMetadata,
    scale: &Scale,
    enriched: &Enriched,
    aggregated: &Aggregated,
) -> Report {
    let mut by_student: HashMap<&StudentId, Vec<&EnrichedScore>> = HashMap::new();
    for score in &enriched.scores {
        by_student.entry(&score.student).or_default().push(score);
    }
    for scores in by_student.values_mut() {
        scores.sort_by_key(|s| scale.position(&s.question));
    }

    let students = aggregated
        .students
        .iter()
        .map(|result| {
            let scores = by_student
                .get(&result.student)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let synthesis = aggregated
                .problems
                .iter()
                .filter(|p| p.student == result.student)
                .map(|p| ProblemLine {
                    problem: p.problem.clone(),
                    earned: p.weighted,
                    total: p.max_points,
                })
                .collect();

            let tables = metadata
                .problems
                .iter()
                .map(|problem| ProblemTable {
                    problem: problem.clone(),
                    questions: scores
                        .iter()
                        .filter(|s| &s.question.problem == problem)
                        .map(|s| QuestionRow {
                            label: s.question.label.clone(),
                            scale: s.max_points,
                            on_paper: s.on_paper,
                            weighted: s.weighted,
                            class_success: s.class_success,
                        })
                        .collect(),
                })
                .filter(|t| !t.questions.is_empty())
                .collect();

            StudentReport {
                header: Header {
                    exam_name: metadata.exam_name.clone(),
                    student: result.student.clone(),
                    rank: result.rank,
                    grade: result.normalized,
                    class_mean: metadata.class_mean,
                    class_std: metadata.class_std,
                },
                synthesis,
                tables,
            }
        })
        .collect();

    Report {
        generated_at: Utc::now(),
        metadata,
        students,
    }
}
