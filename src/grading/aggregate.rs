use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{GradeError, Result};
use crate::grading::enrich::Enriched;
use crate::grading::rank::competition_rank;
use crate::grading::types::{ProblemResult, StudentId, StudentResult};
use crate::grading::utility::{mean, ratio, stddev};
use crate::transform::Transform;

/// Mean and population standard deviation of a grade distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Distribution {
    pub mean: f64,
    pub std: f64,
}

impl Distribution {
    pub fn of(values: &[f64]) -> Self {
        let m = mean(values);
        Self {
            mean: m,
            std: stddev(values, m),
        }
    }
}

/// Everything the rescale step needs besides the data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSettings {
    pub full_scale: f64,
    pub target_mean: Option<f64>,
    pub target_std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    /// Student-major, problems in page order.
    pub problems: Vec<ProblemResult>,
    /// Students in order of first appearance.
    pub students: Vec<StudentResult>,
    /// Distribution of the transformed grades.
    pub transformed: Distribution,
    /// Target actually applied by the rescale.
    pub target: Distribution,
    /// Distribution of the normalized grades.
    pub normalized: Distribution,
}

/// Linear rescale of `values` from `from` to `to`.
///
/// A zero-variance input cannot be stretched; every value then lands on the
/// target mean. Zero variance is read from the values themselves: the mean of
/// identical values is not always exact, which leaves a residual std.
pub fn rescale(values: &[f64], from: Distribution, to: Distribution) -> Vec<f64> {
    let constant = values.windows(2).all(|w| w[0] == w[1]);
    if constant || from.std == 0.0 {
        return vec![to.mean; values.len()];
    }
    values
        .iter()
        .map(|v| (v - from.mean) / from.std * to.std + to.mean)
        .collect()
}

/// Rolls enriched scores up to problem and student totals, applies the
/// transform, rescales and ranks.
///
/// # Errors
///
/// Returns [`GradeError::TransformError`] for the first student whose
/// transformed grade is not a finite number.
#[tracing::instrument(skip_all, fields(students = students.len(), transform = %transform))]
pub fn aggregate(
    enriched: &Enriched,
    students: &[StudentId],
    problems: &[String],
    transform: &Transform,
    settings: AggregateSettings,
) -> Result<Aggregated> {
    // (weighted, max) accumulators
    let mut per_problem: HashMap<(&StudentId, &str), (f64, f64)> = HashMap::new();
    for score in &enriched.scores {
        let acc = per_problem
            .entry((&score.student, score.question.problem.as_str()))
            .or_default();
        acc.0 += score.weighted;
        acc.1 += score.max_points;
    }

    let mut problem_results = Vec::new();
    let mut totals: HashMap<&StudentId, (f64, f64)> = HashMap::new();
    for student in students {
        for problem in problems {
            if let Some(&(weighted, max_points)) = per_problem.get(&(student, problem.as_str())) {
                let total = totals.entry(student).or_default();
                total.0 += weighted;
                total.1 += max_points;

                problem_results.push(ProblemResult {
                    student: student.clone(),
                    problem: problem.clone(),
                    weighted,
                    max_points,
                    success_ratio: ratio(weighted, max_points),
                });
            }
        }
    }

    let mut partial = Vec::with_capacity(students.len());
    for student in students {
        let (weighted, max_points) = totals.get(student).copied().unwrap_or_default();
        let raw_grade = ratio(weighted, max_points) * settings.full_scale;
        let transformed = transform.apply(raw_grade);
        if !transformed.is_finite() {
            error!(student = %student, raw_grade, transformed, "Transform failed");
            return Err(GradeError::TransformError {
                student: student.clone(),
                value: transformed,
            });
        }
        debug!(student = %student, raw_grade, transformed, "Student rolled up");
        partial.push((student, weighted, max_points, raw_grade, transformed));
    }

    let transformed_values: Vec<f64> = partial.iter().map(|p| p.4).collect();
    let transformed = Distribution::of(&transformed_values);
    let target = Distribution {
        mean: settings.target_mean.unwrap_or(transformed.mean),
        std: settings.target_std.unwrap_or(transformed.std),
    };
    let normalized_values = rescale(&transformed_values, transformed, target);
    let ranks = competition_rank(&normalized_values);

    let student_results: Vec<StudentResult> = partial
        .into_iter()
        .zip(normalized_values.iter().zip(&ranks))
        .map(
            |((student, weighted, max_points, raw_grade, transformed), (&normalized, &rank))| {
                StudentResult {
                    student: student.clone(),
                    weighted,
                    max_points,
                    raw_grade,
                    transformed,
                    normalized,
                    rank,
                }
            },
        )
        .collect();

    let normalized = Distribution::of(&normalized_values);
    info!(
        transformed_mean = transformed.mean,
        transformed_std = transformed.std,
        target_mean = target.mean,
        target_std = target.std,
        "Grades normalized"
    );

    Ok(Aggregated {
        problems: problem_results,
        students: student_results,
        transformed,
        target,
        normalized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::enrich::enrich;
    use crate::loader::{LoadedExam, Page, load_exam};

    const SETTINGS: AggregateSettings = AggregateSettings {
        full_scale: 20.0,
        target_mean: None,
        target_std: None,
    };

    fn exam(students: &[Vec<&str>]) -> LoadedExam {
        let mut rows = vec![
            vec!["Barème", "1", "2"],
            vec!["", "2", "3"],
            vec![],
            vec![],
            vec!["Nom", "Prénom", "1", "2"],
        ];
        rows.extend(students.iter().cloned());
        load_exam(&[Page::from_rows("Pb1", &rows)], 4).unwrap()
    }

    fn run(exam: &LoadedExam, transform: &Transform, settings: AggregateSettings) -> Result<Aggregated> {
        let enriched = enrich(exam, 4.0)?;
        aggregate(&enriched, &exam.students, &exam.problems, transform, settings)
    }

    #[test]
    fn test_two_students_identity_rescale() {
        let e = exam(&[vec!["A", "a", "4", "4"], vec!["B", "b", "2", "2"]]);
        let agg = run(&e, &Transform::identity(), SETTINGS).unwrap();

        let a = &agg.students[0];
        let b = &agg.students[1];
        assert_eq!((a.weighted, a.max_points), (5.0, 5.0));
        assert_eq!(a.transformed, 20.0);
        assert_eq!(b.weighted, 2.5);
        assert_eq!(b.transformed, 10.0);
        assert_eq!(agg.transformed, Distribution { mean: 15.0, std: 5.0 });
        assert_eq!((a.normalized, a.rank), (20.0, 1));
        assert_eq!((b.normalized, b.rank), (10.0, 2));

        assert_eq!(agg.problems.len(), 2);
        assert_eq!(agg.problems[1].success_ratio, 0.5);
    }

    #[test]
    fn test_rescale_to_target() {
        let e = exam(&[
            vec!["A", "a", "4", "4"],
            vec!["B", "b", "2", "2"],
            vec!["C", "c", "1", "3"],
        ]);
        let settings = AggregateSettings {
            target_mean: Some(12.0),
            target_std: Some(3.0),
            ..SETTINGS
        };
        let agg = run(&e, &Transform::identity(), settings).unwrap();

        assert!((agg.normalized.mean - 12.0).abs() < 1e-9);
        assert!((agg.normalized.std - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_variance_lands_on_target_mean() {
        let e = exam(&[vec!["A", "a", "2", "2"], vec!["B", "b", "2", "2"]]);
        let settings = AggregateSettings {
            target_mean: Some(11.0),
            ..SETTINGS
        };
        let agg = run(&e, &Transform::identity(), settings).unwrap();

        assert!(agg.students.iter().all(|s| s.normalized == 11.0));
        assert!(agg.students.iter().all(|s| s.rank == 1));
    }

    #[test]
    fn test_identical_inexact_grades_land_on_target_mean() {
        let e = exam(&[
            vec!["A", "a", "4", "4"],
            vec!["B", "b", "2", "2"],
            vec!["C", "c", "1", "3"],
        ]);
        let settings = AggregateSettings {
            target_mean: Some(10.0),
            target_std: Some(2.0),
            ..SETTINGS
        };
        let agg = run(&e, &Transform::parse("0.1").unwrap(), settings).unwrap();

        assert!(agg.students.iter().all(|s| s.transformed == 0.1));
        let normalized: Vec<_> = agg.students.iter().map(|s| s.normalized).collect();
        assert_eq!(normalized, vec![10.0, 10.0, 10.0]);
        assert!(agg.students.iter().all(|s| s.rank == 1));
    }

    #[test]
    fn test_rescale_ignores_residual_std() {
        let values = [0.1, 0.1, 0.1];
        let from = Distribution::of(&values);
        let to = Distribution { mean: 10.0, std: 2.0 };

        assert_eq!(rescale(&values, from, to), vec![10.0; 3]);
    }

    #[test]
    fn test_transform_applied_before_rescale() {
        let e = exam(&[vec!["A", "a", "4", "4"], vec!["B", "b", "2", "2"]]);
        let transform = Transform::parse("x / 2 + 5").unwrap();
        let agg = run(&e, &transform, SETTINGS).unwrap();

        assert_eq!(agg.students[0].raw_grade, 20.0);
        assert_eq!(agg.students[0].transformed, 15.0);
        assert_eq!(agg.students[1].transformed, 10.0);
    }

    #[test]
    fn test_transform_error_names_student() {
        let e = exam(&[vec!["A", "a", "4", "4"], vec!["B", "b", "0", "0"]]);
        let transform = Transform::parse("1 / x").unwrap();

        match run(&e, &transform, SETTINGS) {
            Err(GradeError::TransformError { student, value }) => {
                assert_eq!(student.surname, "B");
                assert!(value.is_infinite());
            }
            other => panic!("expected TransformError, got {other:?}"),
        }
    }

    #[test]
    fn test_rank_law() {
        let e = exam(&[
            vec!["A", "a", "3", "1"],
            vec!["B", "b", "4", "4"],
            vec!["C", "c", "3", "1"],
            vec!["D", "d", "0", "2"],
        ]);
        let agg = run(&e, &Transform::identity(), SETTINGS).unwrap();

        for x in &agg.students {
            for y in &agg.students {
                if x.normalized > y.normalized {
                    assert!(x.rank < y.rank);
                } else if x.normalized == y.normalized {
                    assert_eq!(x.rank, y.rank);
                }
            }
        }
        let ranks: Vec<_> = agg.students.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![2, 1, 2, 4]);
    }
}
