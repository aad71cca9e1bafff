use std::collections::HashMap;

use ndarray::Array1;

use crate::address::{Address, SuffixedAddress};
use crate::distributions::{Distribution, Value};
use crate::error::{PplError, Result};

/// One recorded random choice.
#[derive(Debug, Clone)]
pub struct Sample {
    pub address: Address,
    pub address_suffixed: SuffixedAddress,
    pub name: Option<String>,
    /// The prior, carrying proposal parameters when a proposal generated `value`.
    pub distribution: Distribution,
    pub value: Value,
    /// Log-density of `value` under whichever distribution generated it.
    pub log_prob: f64,
    /// Log-density of `value` under the prior.
    pub log_prior: f64,
    pub controlled: bool,
    pub reused: bool,
}

impl Sample {
    pub fn value_dim(&self) -> usize {
        self.value.len()
    }
}

/// One recorded observation.
#[derive(Debug, Clone)]
pub struct Observation {
    pub address: Address,
    pub address_suffixed: SuffixedAddress,
    pub name: Option<String>,
    pub distribution: Distribution,
    pub value: Value,
    pub log_prob: f64,
}

/// The ordered record of one execution of a model.
///
/// Lookups by address and by name go through an index built by
/// `add_sample`. Editing values in `samples` is fine; pushing or removing
/// samples directly leaves the index stale, and lookups then miss.
#[derive(Debug, Clone)]
pub struct Trace<R> {
    pub samples: Vec<Sample>,
    pub observes: Vec<Observation>,
    pub observes_embedding: Option<Array1<f64>>,
    pub result: Option<R>,
    pub length: usize,
    pub length_controlled: usize,
    /// Joint log-probability: prior log-probs of every sample plus `log_prob_observed`.
    pub log_prob: f64,
    pub log_prob_observed: f64,
    /// Only set when the trace was generated for importance sampling.
    pub log_importance_weight: Option<f64>,
    index: HashMap<SuffixedAddress, usize>,
    named: HashMap<String, usize>,
}

impl<R> Default for Trace<R> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            observes: Vec::new(),
            observes_embedding: None,
            result: None,
            length: 0,
            length_controlled: 0,
            log_prob: 0.0,
            log_prob_observed: 0.0,
            log_importance_weight: None,
            index: HashMap::new(),
            named: HashMap::new(),
        }
    }
}

impl<R> Trace<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, sample: Sample) -> Result<()> {
        if self.index.contains_key(&sample.address_suffixed) {
            return Err(PplError::DuplicateAddress(sample.address_suffixed));
        }
        self.index
            .insert(sample.address_suffixed.clone(), self.samples.len());
        if let Some(name) = &sample.name {
            self.named.insert(name.clone(), self.samples.len());
        }
        self.samples.push(sample);
        self.length = self.samples.len();
        Ok(())
    }

    pub fn add_observation(&mut self, observation: Observation) {
        self.log_prob_observed += observation.log_prob;
        self.observes.push(observation);
    }

    /// Move the recorded samples and observations into a trace carrying
    /// `result`, then close it.
    pub fn with_result<S>(self, result: S, log_importance_weight: Option<f64>) -> Trace<S> {
        let mut trace = Trace {
            samples: self.samples,
            observes: self.observes,
            observes_embedding: self.observes_embedding,
            result: None,
            length: 0,
            length_controlled: 0,
            log_prob: 0.0,
            log_prob_observed: 0.0,
            log_importance_weight: None,
            index: self.index,
            named: self.named,
        };
        trace.end(result, log_importance_weight);
        trace
    }

    /// Close the trace: fix its result and recompute the derived scalars.
    pub fn end(&mut self, result: R, log_importance_weight: Option<f64>) {
        self.result = Some(result);
        self.length = self.samples.len();
        self.length_controlled = self.samples.iter().filter(|s| s.controlled).count();
        self.log_prob_observed = self.observes.iter().map(|o| o.log_prob).sum();
        self.log_prob =
            self.samples.iter().map(|s| s.log_prior).sum::<f64>() + self.log_prob_observed;
        self.log_importance_weight = log_importance_weight;
    }

    pub fn has_sample(&self, address: &SuffixedAddress) -> bool {
        self.index.contains_key(address)
    }

    pub fn get_sample(&self, address: &SuffixedAddress) -> Option<&Sample> {
        self.index.get(address).and_then(|&i| self.samples.get(i))
    }

    /// Look up a sample by the name given at its `sample` call. A name used
    /// more than once (inside a loop, say) resolves to its latest sample.
    pub fn named(&self, name: &str) -> Option<&Sample> {
        self.named.get(name).and_then(|&i| self.samples.get(i))
    }

    pub fn get_value(&self, address: &SuffixedAddress) -> Option<&Value> {
        self.get_sample(address).map(|s| &s.value)
    }

    pub fn samples_controlled(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| s.controlled)
    }

    pub fn get_result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    /// Static addresses of all samples, joined with `|`.
    pub fn addresses(&self) -> String {
        self.samples
            .iter()
            .map(|s| s.address.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn addresses_suffixed(&self) -> String {
        self.samples
            .iter()
            .map(|s| s.address_suffixed.to_string())
            .collect::<Vec<_>>()
            .join("|")
    }
}
