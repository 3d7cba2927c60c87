use std::collections::HashSet;

use tracing::debug;

use crate::error::{GradeError, Result};
use crate::grading::types::{RawScore, StudentId};
use crate::loader::{Page, ScaleFragment, parse_number};

/// Scores read from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScores {
    pub identity_fields: [String; 2],
    pub students: Vec<StudentId>,
    pub scores: Vec<RawScore>,
}

/// Reads the student rows below `header_row`.
///
/// The two leading columns identify the student; the next ones line up with
/// the fragment's questions by position. Row numbers in errors are 1-based.
pub fn load_scores(page: &Page, fragment: &ScaleFragment, header_row: usize) -> Result<PageScores> {
    let identity_fields = [
        page.cell(header_row, 0).to_string(),
        page.cell(header_row, 1).to_string(),
    ];
    let expected = fragment.questions.len();

    let mut seen = HashSet::new();
    let mut students = Vec::new();
    let mut scores = Vec::new();

    for r in (header_row + 1)..page.row_count() {
        let row = page.row(r);
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let (surname, given_name) = (page.cell(r, 0), page.cell(r, 1));
        if surname.is_empty() && given_name.is_empty() {
            return Err(GradeError::UnknownStudentRow {
                problem: page.name.clone(),
                row: r + 1,
            });
        }

        let found = row.len().saturating_sub(2);
        if found < expected {
            return Err(GradeError::MisalignedColumns {
                problem: page.name.clone(),
                row: r + 1,
                expected,
                found,
            });
        }
        if (2 + expected..row.len()).any(|c| !page.cell(r, c).is_empty()) {
            debug!(problem = %page.name, row = r + 1, "Ignoring cells past the last question");
        }

        let student = StudentId::new(surname, given_name);
        if !seen.insert(student.clone()) {
            return Err(GradeError::DuplicateStudent {
                problem: page.name.clone(),
                student,
            });
        }

        for (i, question) in fragment.questions.iter().enumerate() {
            let c = i + 2;
            let cell = page.cell(r, c);
            let points = if cell.is_empty() {
                None
            } else {
                Some(parse_number(cell).ok_or_else(|| GradeError::MalformedScore {
                    problem: page.name.clone(),
                    row: r + 1,
                    column: c + 1,
                    cell: cell.to_string(),
                })?)
            };
            scores.push(RawScore {
                student: student.clone(),
                question: question.key.clone(),
                points,
            });
        }

        students.push(student);
    }

    Ok(PageScores {
        identity_fields,
        students,
        scores,
    })
}
