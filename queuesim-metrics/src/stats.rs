//! Summary statistics with explicit handling of empty inputs.

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Unweighted mean of per-group means.
///
/// Each group counts once regardless of how many samples it holds. If any
/// group mean is undefined, so is the result.
pub fn mean_of_means(means: &[Option<f64>]) -> Option<f64> {
    let defined: Option<Vec<f64>> = means.iter().copied().collect();
    mean(&defined?)
}

/// Mean of the defined values only, or `None` if there are none.
pub fn mean_skipping_missing(values: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    mean(&defined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0]), Some(2.0));
        assert_eq!(mean(&[1.0, 2.0, 3.0, 6.0]), Some(3.0));
    }

    #[test]
    fn test_mean_of_means_is_unweighted() {
        // Group sizes are irrelevant: (1 + 2 + 6) / 3.
        let groups = [vec![1.0; 100], vec![2.0], vec![5.0, 7.0]];
        let means: Vec<Option<f64>> = groups.iter().map(|g| mean(g)).collect();
        assert_eq!(mean_of_means(&means), Some(3.0));
    }

    #[test]
    fn test_mean_of_means_with_undefined_group() {
        assert_eq!(mean_of_means(&[Some(1.0), None, Some(2.0)]), None);
        assert_eq!(mean_of_means(&[]), None);
    }

    #[test]
    fn test_mean_skipping_missing() {
        assert_eq!(mean_skipping_missing(&[Some(1.0), None, Some(3.0)]), Some(2.0));
        assert_eq!(mean_skipping_missing(&[None, None]), None);
    }
}
