//! Checks run over every page at once, before any computation.
//!
//! Each check collects all of its offenders before failing so the diagnostic
//! lists them in one go.

use std::collections::HashSet;

use tracing::{debug, error};

use crate::error::{CellRef, GradeError, Result};
use crate::grading::types::QuestionKey;
use crate::loader::LoadedExam;

#[tracing::instrument(skip_all, fields(students = exam.students.len(), paper_max = paper_max))]
pub fn validate(exam: &LoadedExam, paper_max: f64) -> Result<()> {
    if exam.students.is_empty() {
        return Err(GradeError::EmptyInput("no student row found".to_string()));
    }

    let missing_scale: Vec<QuestionKey> = exam
        .scale
        .questions()
        .iter()
        .filter(|q| q.max_points.is_none())
        .map(|q| q.key.clone())
        .collect();
    if !missing_scale.is_empty() {
        error!(count = missing_scale.len(), "Scale has blank max-points");
        return Err(GradeError::IncompleteScale(missing_scale));
    }

    if exam.scale.total() == 0.0 {
        return Err(GradeError::EmptyInput(
            "the scale awards no points".to_string(),
        ));
    }

    // Every student must have a cell for every question, blank or not.
    let present: HashSet<(&_, &_)> = exam
        .scores
        .iter()
        .map(|s| (&s.student, &s.question))
        .collect();
    let mut missing_scores: Vec<CellRef> = exam
        .scores
        .iter()
        .filter(|s| s.points.is_none())
        .map(|s| CellRef {
            student: s.student.clone(),
            question: s.question.clone(),
            value: None,
        })
        .collect();
    for student in &exam.students {
        for question in exam.scale.questions() {
            if !present.contains(&(student, &question.key)) {
                missing_scores.push(CellRef {
                    student: student.clone(),
                    question: question.key.clone(),
                    value: None,
                });
            }
        }
    }
    if !missing_scores.is_empty() {
        error!(count = missing_scores.len(), "Scores are missing");
        return Err(GradeError::IncompleteScores(missing_scores));
    }

    let out_of_range: Vec<CellRef> = exam
        .scores
        .iter()
        .filter_map(|s| {
            s.points
                .filter(|&p| !(0.0..=paper_max).contains(&p))
                .map(|p| CellRef {
                    student: s.student.clone(),
                    question: s.question.clone(),
                    value: Some(p),
                })
        })
        .collect();
    if !out_of_range.is_empty() {
        error!(count = out_of_range.len(), "Scores outside the paper range");
        return Err(GradeError::OutOfRangeScore {
            paper_max,
            offenders: out_of_range,
        });
    }

    debug!(scores = exam.scores.len(), "Input validated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Page, load_exam};

    fn exam(scale: Vec<&str>, students: &[Vec<&str>]) -> LoadedExam {
        let mut rows = vec![
            vec!["Barème", "1", "2"],
            scale,
            vec![],
            vec![],
            vec!["Nom", "Prénom", "1", "2"],
        ];
        rows.extend(students.iter().cloned());
        load_exam(&[Page::from_rows("Pb1", &rows)], 4).unwrap()
    }

    #[test]
    fn test_valid_input() {
        let e = exam(vec!["", "2", "3"], &[vec!["A", "a", "4", "0"]]);
        assert!(validate(&e, 4.0).is_ok());
    }

    #[test]
    fn test_incomplete_scale() {
        let e = exam(vec!["", "2", ""], &[vec!["A", "a", "4", "0"]]);
        match validate(&e, 4.0) {
            Err(GradeError::IncompleteScale(keys)) => {
                assert_eq!(keys, vec![QuestionKey::new("Pb1", "2")]);
            }
            other => panic!("expected IncompleteScale, got {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_scores() {
        let e = exam(vec!["", "2", "3"], &[vec!["A", "a", "4", ""]]);
        assert!(matches!(
            validate(&e, 4.0),
            Err(GradeError::IncompleteScores(cells)) if cells.len() == 1
        ));
    }

    #[test]
    fn test_student_absent_from_a_page() {
        let pb1 = Page::from_rows(
            "Pb1",
            &[
                vec!["Barème", "1"],
                vec!["", "2"],
                vec![],
                vec![],
                vec!["Nom", "Prénom", "1"],
                vec!["A", "a", "4"],
                vec!["B", "b", "4"],
            ],
        );
        let pb2 = Page::from_rows(
            "Pb2",
            &[
                vec!["Barème", "1"],
                vec!["", "2"],
                vec![],
                vec![],
                vec!["Nom", "Prénom", "1"],
                vec!["A", "a", "4"],
            ],
        );
        let e = load_exam(&[pb1, pb2], 4).unwrap();

        match validate(&e, 4.0) {
            Err(GradeError::IncompleteScores(cells)) => {
                assert_eq!(cells.len(), 1);
                assert_eq!(cells[0].student.surname, "B");
                assert_eq!(cells[0].question, QuestionKey::new("Pb2", "1"));
            }
            other => panic!("expected IncompleteScores, got {other:?}"),
        }
    }

    #[test]
    fn test_score_just_above_paper_max() {
        let e = exam(
            vec!["", "2", "3"],
            &[vec!["A", "a", "4", "4"], vec!["B", "b", "4,01", "-1"]],
        );
        match validate(&e, 4.0) {
            Err(GradeError::OutOfRangeScore { offenders, .. }) => {
                assert_eq!(offenders.len(), 2);
                assert_eq!(offenders[0].value, Some(4.01));
                assert_eq!(offenders[1].value, Some(-1.0));
            }
            other => panic!("expected OutOfRangeScore, got {other:?}"),
        }
    }

    #[test]
    fn test_no_students() {
        let e = exam(vec!["", "2", "3"], &[]);
        assert!(matches!(validate(&e, 4.0), Err(GradeError::EmptyInput(_))));
    }

    #[test]
    fn test_zero_total_scale() {
        let e = exam(vec!["", "0", "0"], &[vec!["A", "a", "4", "4"]]);
        assert!(matches!(validate(&e, 4.0), Err(GradeError::EmptyInput(_))));
    }
}
