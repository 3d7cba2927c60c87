/// Mean of a grade series (class success per question, class grade
/// distribution). Returns 0.0 for an empty class.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n) of a grade series around
/// `mean`; this is the spread the rescale stretches. Returns 0.0 for an empty
/// class.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// `part / total`, or 0.0 when there is nothing to divide by.
pub fn ratio(part: f64, total: f64) -> f64 {
    if total == 0.0 { 0.0 } else { part / total }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_population_stddev() {
        let values = [20.0, 10.0];
        let m = mean(&values);
        assert_eq!(m, 15.0);
        assert_eq!(stddev(&values, m), 5.0);
    }

    #[test]
    fn test_ratio_zero_total() {
        assert_eq!(ratio(3.0, 0.0), 0.0);
        assert_eq!(ratio(3.0, 4.0), 0.75);
    }
}
