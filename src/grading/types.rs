//! Data types shared by the loaders, the validator and the aggregation pipeline.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Identifies a question by the problem (page) it belongs to and its column label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QuestionKey {
    pub problem: String,
    pub label: String,
}

impl QuestionKey {
    pub fn new(problem: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.problem, self.label)
    }
}

/// The two identifying columns of a student row (surname, given name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StudentId {
    pub surname: String,
    pub given_name: String,
}

impl StudentId {
    pub fn new(surname: impl Into<String>, given_name: impl Into<String>) -> Self {
        Self {
            surname: surname.into(),
            given_name: given_name.into(),
        }
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.surname, self.given_name)
    }
}

/// A scale entry. `max_points` is `None` when the scale cell was left blank.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub key: QuestionKey,
    pub max_points: Option<f64>,
}

/// The grading scale of the whole exam, in spreadsheet order.
#[derive(Debug, Clone, Default)]
pub struct Scale {
    questions: Vec<Question>,
    index: HashMap<QuestionKey, usize>,
}

impl Scale {
    pub fn push(&mut self, question: Question) {
        self.index.insert(question.key.clone(), self.questions.len());
        self.questions.push(question);
    }

    pub fn get(&self, key: &QuestionKey) -> Option<&Question> {
        self.index.get(key).map(|&i| &self.questions[i])
    }

    /// Max-points for `key`, if the question exists and its cell was filled.
    pub fn max_points(&self, key: &QuestionKey) -> Option<f64> {
        self.get(key).and_then(|q| q.max_points)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Position of `key` in spreadsheet order.
    pub fn position(&self, key: &QuestionKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn total(&self) -> f64 {
        self.questions.iter().filter_map(|q| q.max_points).sum()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Points written on the paper for one (student, question) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScore {
    pub student: StudentId,
    pub question: QuestionKey,
    pub points: Option<f64>,
}

/// A validated score joined with its scale entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedScore {
    pub student: StudentId,
    pub question: QuestionKey,
    pub max_points: f64,
    pub on_paper: f64,
    pub success_ratio: f64,
    pub weighted: f64,
    /// Mean success ratio of the whole class on this question.
    pub class_success: f64,
}

/// Per (student, problem) totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemResult {
    pub student: StudentId,
    pub problem: String,
    pub weighted: f64,
    pub max_points: f64,
    pub success_ratio: f64,
}

/// Per student totals and final grades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentResult {
    pub student: StudentId,
    pub weighted: f64,
    pub max_points: f64,
    /// `weighted / max_points * full_scale`, before the transform.
    pub raw_grade: f64,
    pub transformed: f64,
    pub normalized: f64,
    pub rank: usize,
}

/// Exam-wide figures collected along the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamMetadata {
    pub exam_name: String,
    /// Header names of the two identity columns, e.g. `["Nom", "Prénom"]`.
    pub identity_fields: [String; 2],
    pub problems: Vec<String>,
    pub full_scale: f64,
    pub paper_max: f64,
    /// Largest number of questions in a single problem; layout only.
    pub max_questions: usize,
    pub target_mean: f64,
    pub target_std: f64,
    pub transformed_mean: f64,
    pub transformed_std: f64,
    pub class_mean: f64,
    pub class_std: f64,
}
