use rand::distributions::{Distribution as RandDistribution, WeightedIndex};
use rand::Rng;

use crate::error::{PplError, Result};
use crate::trace::Trace;
use crate::utils::{logsumexp, mean_and_variance};

/// A (possibly weighted) collection of values produced by an inference run.
///
/// Log weights are stored unnormalized. Non-finite log weights count as zero
/// probability when normalizing.
#[derive(Debug, Clone)]
pub struct Empirical<T> {
    values: Vec<T>,
    log_weights: Option<Vec<f64>>,
    name: String,
}

impl<T> Empirical<T> {
    /// Equally weighted values.
    pub fn from_values(values: Vec<T>, name: impl Into<String>) -> Self {
        Self {
            values,
            log_weights: None,
            name: name.into(),
        }
    }

    /// Values paired with their unnormalized log weights.
    pub fn from_weighted(pairs: Vec<(T, f64)>, name: impl Into<String>) -> Self {
        let (values, log_weights) = pairs.into_iter().unzip();
        Self {
            values,
            log_weights: Some(log_weights),
            name: name.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    pub fn log_weights(&self) -> Option<&[f64]> {
        self.log_weights.as_deref()
    }

    pub fn is_weighted(&self) -> bool {
        self.log_weights.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Normalized weights. All zero if no log weight is finite.
    pub fn weights(&self) -> Vec<f64> {
        let n = self.values.len();
        match &self.log_weights {
            None => vec![1.0 / n as f64; n],
            Some(lw) => {
                let total = logsumexp(lw);
                if total == f64::NEG_INFINITY {
                    return vec![0.0; n];
                }
                lw.iter()
                    .map(|&w| if w.is_finite() { (w - total).exp() } else { 0.0 })
                    .collect()
            }
        }
    }

    /// Weighted average of `f` over the values.
    pub fn expectation<F: Fn(&T) -> f64>(&self, f: F) -> f64 {
        self.values
            .iter()
            .zip(self.weights())
            .filter(|(_, w)| *w > 0.0)
            .map(|(v, w)| w * f(v))
            .sum()
    }

    /// Weighted mean and variance of `f` over the values.
    pub fn mean_and_variance<F: Fn(&T) -> f64>(&self, f: F) -> (f64, f64) {
        if !self.is_weighted() {
            let xs: Vec<f64> = self.values.iter().map(&f).collect();
            return mean_and_variance(&xs);
        }
        let mean = self.expectation(&f);
        let variance = self.expectation(|v| (f(v) - mean).powi(2));
        (mean, variance)
    }

    /// Kish effective sample size, `1 / sum(w^2)`.
    pub fn effective_sample_size(&self) -> f64 {
        let sq: f64 = self.weights().iter().map(|w| w * w).sum();
        if sq > 0.0 {
            1.0 / sq
        } else {
            0.0
        }
    }

    /// Apply `f` to every value, keeping weights and name.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Empirical<U> {
        Empirical {
            values: self.values.iter().map(f).collect(),
            log_weights: self.log_weights.clone(),
            name: self.name.clone(),
        }
    }

    /// Draw one value according to the normalized weights.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&T> {
        let index = WeightedIndex::new(self.weights()).map_err(|_| PplError::DegenerateWeights)?;
        Ok(&self.values[index.sample(rng)])
    }
}

impl<T: Clone> Empirical<T> {
    /// Multinomial resampling into `num_samples` equally weighted values.
    pub fn resample<R: Rng + ?Sized>(&self, num_samples: usize, rng: &mut R) -> Result<Self> {
        let index = WeightedIndex::new(self.weights()).map_err(|_| PplError::DegenerateWeights)?;
        let values = (0..num_samples)
            .map(|_| self.values[index.sample(rng)].clone())
            .collect();
        Ok(Self {
            values,
            log_weights: None,
            name: format!("{}, resampled", self.name),
        })
    }
}

impl<R: Clone> Empirical<Trace<R>> {
    /// The model outputs of the collected traces, keeping their weights.
    pub fn results(&self) -> Empirical<R> {
        let mut values = Vec::with_capacity(self.values.len());
        let mut log_weights = Vec::with_capacity(self.values.len());
        for (i, trace) in self.values.iter().enumerate() {
            if let Some(result) = trace.get_result() {
                values.push(result.clone());
                if let Some(lw) = &self.log_weights {
                    log_weights.push(lw[i]);
                }
            }
        }
        Empirical {
            values,
            log_weights: self.log_weights.as_ref().map(|_| log_weights),
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_unweighted_statistics() {
        let e = Empirical::from_values(vec![1.0, 2.0, 3.0, 4.0], "test");
        assert_eq!(e.len(), 4);
        assert!(!e.is_weighted());
        let (m, v) = e.mean_and_variance(|x| *x);
        assert_relative_eq!(m, 2.5);
        assert_relative_eq!(v, 1.25);
        assert_relative_eq!(e.effective_sample_size(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weights_are_normalized() {
        let e = Empirical::from_weighted(
            vec![(0.0, 1000.0), (1.0, 1000.0 + 3f64.ln()), (2.0, f64::NAN)],
            "weighted",
        );
        let w = e.weights();
        assert_relative_eq!(w[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(w[1], 0.75, epsilon = 1e-12);
        assert_eq!(w[2], 0.0);
        assert_relative_eq!(e.expectation(|x| *x), 0.75, epsilon = 1e-12);
        assert_relative_eq!(e.effective_sample_size(), 1.0 / 0.625, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_weights() {
        let e = Empirical::from_weighted(vec![(1, f64::NEG_INFINITY)], "dead");
        assert_eq!(e.weights(), vec![0.0]);
        assert_eq!(e.effective_sample_size(), 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(e.resample(10, &mut rng), Err(PplError::DegenerateWeights)));
    }

    #[test]
    fn test_resample_follows_weights() {
        let e = Empirical::from_weighted(vec![("a", 0.0), ("b", f64::NEG_INFINITY)], "w");
        let mut rng = StdRng::seed_from_u64(42);
        let r = e.resample(50, &mut rng).unwrap();
        assert_eq!(r.len(), 50);
        assert!(r.values().iter().all(|v| *v == "a"));
        assert!(!r.is_weighted());
        assert_eq!(*e.sample(&mut rng).unwrap(), "a");
    }

    #[test]
    fn test_map_keeps_weights() {
        let e = Empirical::from_weighted(vec![(2.0, 0.5), (3.0, -0.5)], "m");
        let squared = e.map(|x| x * x);
        assert_eq!(squared.values(), &[4.0, 9.0]);
        assert_eq!(squared.log_weights(), e.log_weights());
        assert_eq!(squared.name(), "m");
    }
}
