use crate::models::rating::RatingVector;

/// Pearson correlation of two rating vectors over the keys they share.
///
/// Returns 0.0 when the vectors share no key or either side has zero
/// variance on the shared keys, so the result is always in `[-1, 1]`.
pub fn pearson(a: &RatingVector, b: &RatingVector) -> f64 {
    let shared: Vec<(f64, f64)> = a
        .iter()
        .filter_map(|(key, &x)| b.get(key).map(|&y| (x, y)))
        .collect();
    if shared.is_empty() {
        return 0.0;
    }

    let n = shared.len() as f64;
    let mean_a = shared.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = shared.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &shared {
        let dx = x - mean_a;
        let dy = y - mean_b;
        numerator += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(pairs: &[(i32, f64)]) -> RatingVector {
        pairs.iter().copied().collect()
    }

    #[test]
    fn identical_shape_is_perfectly_correlated() {
        let a = vector(&[(1, 5.0), (2, 3.0)]);
        let b = vector(&[(1, 4.0), (2, 2.0)]);
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn opposite_shape_is_negatively_correlated() {
        let a = vector(&[(1, 5.0), (2, 3.0), (3, 1.0)]);
        let b = vector(&[(1, 1.0), (2, 3.0), (3, 5.0)]);
        assert!((pearson(&a, &b) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn symmetric() {
        let a = vector(&[(1, 5.0), (2, 3.0), (3, 4.0), (7, 1.0)]);
        let b = vector(&[(1, 2.0), (2, 3.0), (3, 5.0), (9, 5.0)]);
        assert_eq!(pearson(&a, &b), pearson(&b, &a));
    }

    #[test]
    fn no_shared_keys_is_zero() {
        let a = vector(&[(1, 5.0), (2, 3.0)]);
        let b = vector(&[(3, 5.0), (4, 3.0)]);
        assert_eq!(pearson(&a, &b), 0.0);
        assert_eq!(pearson(&RatingVector::new(), &b), 0.0);
    }

    #[test]
    fn zero_variance_is_zero() {
        let flat = vector(&[(1, 4.0), (2, 4.0)]);
        let varied = vector(&[(1, 5.0), (2, 1.0)]);
        assert_eq!(pearson(&flat, &varied), 0.0);

        // a single shared key never has variance
        let one = vector(&[(1, 5.0)]);
        assert_eq!(pearson(&one, &varied), 0.0);
    }

    #[test]
    fn only_shared_keys_contribute() {
        let a = vector(&[(1, 5.0), (2, 3.0), (3, 1.0)]);
        let b = vector(&[(1, 5.0), (2, 3.0), (4, 5.0)]);
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-12);
    }
}
