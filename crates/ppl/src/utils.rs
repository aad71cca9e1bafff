use crate::trace::Trace;

/// Log-sum-exp of `x`, ignoring non-finite terms.
///
/// Returns `-inf` when no term is finite.
pub fn logsumexp(x: &[f64]) -> f64 {
    let mx = x
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if mx == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum_exp: f64 = x
        .iter()
        .filter(|v| v.is_finite())
        .map(|&lp| (lp - mx).exp())
        .sum();
    mx + sum_exp.ln()
}

/// Mean and variance of `values`; `(0.0, 0.0)` when empty.
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

/// Compute the mean and variance of the first component of the sample
/// named `name` across `history`. Traces without that sample are skipped.
pub fn compute_mean_and_variance<R>(history: &[Trace<R>], name: &str) -> (f64, f64) {
    let values: Vec<f64> = history
        .iter()
        .filter_map(|t| t.named(name).and_then(|s| s.value.first().copied()))
        .collect();
    mean_and_variance(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_logsumexp() {
        assert_relative_eq!(logsumexp(&[0.0, 0.0]), 2f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(logsumexp(&[-1000.0, -1000.0]), -1000.0 + 2f64.ln(), epsilon = 1e-9);
        assert_relative_eq!(logsumexp(&[1.0, f64::NEG_INFINITY, f64::NAN]), 1.0, epsilon = 1e-12);
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
        assert_eq!(logsumexp(&[f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_mean_and_variance() {
        let (m, v) = mean_and_variance(&[1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(m, 2.5);
        assert_relative_eq!(v, 1.25);
        assert_eq!(mean_and_variance(&[]), (0.0, 0.0));
    }
}
