use std::collections::HashSet;

use crate::error::{GradeError, Result};
use crate::grading::types::{Question, QuestionKey};
use crate::loader::{Page, parse_number};

/// The part of the scale read from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleFragment {
    pub problem: String,
    pub questions: Vec<Question>,
    /// Sum of the max-points that were filled in.
    pub total: f64,
}

/// Reads question labels (row 0) and max-points (row 1).
///
/// Columns blank in both rows are dropped; the first remaining column holds
/// the row titles and is not a question. A blank max-points cell is kept as
/// `None` so the validator can report every gap at once.
pub fn load_scale(page: &Page) -> Result<ScaleFragment> {
    if page.row_count() < 2 {
        return Err(GradeError::EmptyInput(format!(
            "problem '{}' has no scale rows",
            page.name
        )));
    }

    let width = page.row(0).len().max(page.row(1).len());
    let columns: Vec<usize> = (0..width)
        .filter(|&c| !page.cell(0, c).is_empty() || !page.cell(1, c).is_empty())
        .skip(1)
        .collect();

    if columns.is_empty() {
        return Err(GradeError::EmptyInput(format!(
            "problem '{}' has no question column",
            page.name
        )));
    }

    let malformed = |column: usize, reason: String| GradeError::MalformedScale {
        problem: page.name.clone(),
        column: column + 1,
        reason,
    };

    let mut labels = HashSet::new();
    let mut questions = Vec::with_capacity(columns.len());
    let mut total = 0.0;

    for c in columns {
        let label = page.cell(0, c);
        if label.is_empty() {
            return Err(malformed(c, "max-points without a question label".into()));
        }
        if !labels.insert(label) {
            return Err(malformed(c, format!("duplicate question label '{label}'")));
        }

        let cell = page.cell(1, c);
        let max_points = if cell.is_empty() {
            None
        } else {
            let value =
                parse_number(cell).ok_or_else(|| malformed(c, format!("'{cell}' is not a number")))?;
            if value < 0.0 {
                return Err(malformed(c, format!("negative max-points {value}")));
            }
            total += value;
            Some(value)
        };

        questions.push(Question {
            key: QuestionKey::new(page.name.as_str(), label),
            max_points,
        });
    }

    Ok(ScaleFragment {
        problem: page.name.clone(),
        questions,
        total,
    })
}
