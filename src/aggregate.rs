use crate::types::{AggregateResult, Value};

/// Computes count/min/max/mean/population variance over the finite entries of `values`.
///
/// Two linear passes: the first collects min, max, sum and count, the second the squared
/// deviations from the mean. With no finite entries the result is all zeros. A single
/// finite entry has variance 0.
pub fn aggregate(values: &[Value]) -> AggregateResult {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut count: u64 = 0;

    for &v in values.iter().filter(|v| v.is_finite()) {
        count += 1;
        sum += v;
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }

    if count == 0 {
        return AggregateResult::default();
    }

    let mean = sum / count as f64;

    let sum_squared_diff: f64 = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| {
            let d = v - mean;
            d * d
        })
        .sum();

    let variance = if count > 1 {
        sum_squared_diff / count as f64
    } else {
        0.0
    };

    AggregateResult {
        min,
        max,
        mean: mean.clamp(min, max),
        variance,
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_all_zero() {
        assert_eq!(aggregate(&[]), AggregateResult::default());
        let r = aggregate(&[]);
        assert_eq!((r.min, r.max, r.mean, r.variance, r.count), (0.0, 0.0, 0.0, 0.0, 0));
    }

    #[test]
    fn test_all_non_finite_is_all_zero() {
        let r = aggregate(&[f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);
        assert_eq!(r, AggregateResult::default());
    }

    #[test]
    fn test_population_variance() {
        let r = aggregate(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(r.count, 8);
        assert_eq!(r.min, 2.0);
        assert_eq!(r.max, 9.0);
        assert_eq!(r.mean, 5.0);
        assert_eq!(r.variance, 4.0);
        assert_eq!(r.std_dev(), 2.0);
    }

    #[test]
    fn test_single_value_has_zero_variance() {
        let r = aggregate(&[f64::NAN, 3.5]);
        assert_eq!(r.count, 1);
        assert_eq!((r.min, r.max, r.mean, r.variance), (3.5, 3.5, 3.5, 0.0));
    }

    #[test]
    fn test_ignores_non_finite_entries() {
        let r = aggregate(&[1.0, f64::NAN, 3.0, f64::INFINITY]);
        assert_eq!(r.count, 2);
        assert_eq!(r.mean, 2.0);
        assert_eq!(r.variance, 1.0);
    }

    #[test]
    fn test_sanity_bounds() {
        let values: Vec<f64> = (0..10_000).map(|i| ((i as f64) * 0.013).cos() * 1e6 + 0.1).collect();
        let r = aggregate(&values);
        assert!(r.min <= r.mean && r.mean <= r.max);
        assert!(r.variance >= 0.0);
        assert_eq!(r.count, 10_000);
    }
}
