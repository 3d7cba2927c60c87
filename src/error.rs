//! Error taxonomy for the grading pipeline.
//!
//! Every variant is fatal to a run: nothing is retried and no partial output
//! is written once one of these is raised.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::grading::types::{QuestionKey, StudentId};

pub type Result<T> = std::result::Result<T, GradeError>;

/// One offending (student, question) cell, used in diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRef {
    pub student: StudentId,
    pub question: QuestionKey,
    pub value: Option<f64>,
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{} / {} = {}", self.student, self.question, v),
            None => write!(f, "{} / {} = <blank>", self.student, self.question),
        }
    }
}

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("malformed scale in problem '{problem}', column {column}: {reason}")]
    MalformedScale {
        problem: String,
        column: usize,
        reason: String,
    },

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("problem '{problem}', row {row}: student identity columns are blank")]
    UnknownStudentRow { problem: String, row: usize },

    #[error("problem '{problem}', row {row}: expected {expected} score columns, found {found}")]
    MisalignedColumns {
        problem: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("problem '{problem}', row {row}, column {column}: '{cell}' is not a number")]
    MalformedScore {
        problem: String,
        row: usize,
        column: usize,
        cell: String,
    },

    #[error("two pages are named '{0}'; problem names must be unique")]
    DuplicateProblem(String),

    #[error("problem '{problem}': student {student} appears more than once")]
    DuplicateStudent { problem: String, student: StudentId },

    #[error("scale has no max-points for: {}", join(.0))]
    IncompleteScale(Vec<QuestionKey>),

    #[error("missing scores: {}", join(.0))]
    IncompleteScores(Vec<CellRef>),

    #[error("scores outside [0, {paper_max}]: {}", join(.offenders))]
    OutOfRangeScore {
        paper_max: f64,
        offenders: Vec<CellRef>,
    },

    #[error("transform produced {value} for student {student}")]
    TransformError { student: StudentId, value: f64 },

    #[error("invalid transform expression '{expression}' at offset {offset}: {reason}")]
    InvalidExpression {
        expression: String,
        offset: usize,
        reason: String,
    },

    #[error("failed to read page {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
