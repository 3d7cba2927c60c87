use std::cmp::Ordering;

/// Ranks values in descending order using standard competition ranking.
///
/// | values            | ranks        |
/// |-------------------|--------------|
/// | 18, 12, 15        | 1, 3, 2      |
/// | 15, 18, 15, 10    | 2, 1, 2, 4   |
///
/// Equal values share the lowest rank of their group and the next distinct
/// value skips as many ranks as the group holds. Ranks are 1-based and
/// returned in input order.
pub fn competition_rank(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].partial_cmp(&values[a]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0; values.len()];
    for (pos, &i) in order.iter().enumerate() {
        ranks[i] = match pos {
            0 => 1,
            _ if values[order[pos - 1]] == values[i] => ranks[order[pos - 1]],
            _ => pos + 1,
        };
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_values() {
        assert_eq!(competition_rank(&[18.0, 12.0, 15.0]), vec![1, 3, 2]);
    }

    #[test]
    fn test_ties_share_minimum_rank() {
        assert_eq!(competition_rank(&[15.0, 18.0, 15.0, 10.0]), vec![2, 1, 2, 4]);
        assert_eq!(competition_rank(&[10.0, 10.0, 10.0]), vec![1, 1, 1]);
    }

    #[test]
    fn test_empty() {
        assert!(competition_rank(&[]).is_empty());
    }
}
