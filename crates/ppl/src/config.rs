//! Run configuration: trace modes, inference engines and the serde-loadable
//! `InferenceConfig`.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::distributions::Value;
use crate::error::{PplError, Result};

/// Observed values keyed by observation name, overriding the values passed
/// to `observe` in the model.
pub type ObserveMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    Prior,
    Posterior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorInflation {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceEngine {
    ImportanceSampling,
    ImportanceSamplingWithInferenceNetwork,
    LightweightMetropolisHastings,
    RandomWalkMetropolisHastings,
}

impl InferenceEngine {
    pub fn is_importance_sampling(self) -> bool {
        matches!(
            self,
            InferenceEngine::ImportanceSampling
                | InferenceEngine::ImportanceSamplingWithInferenceNetwork
        )
    }

    pub fn is_metropolis_hastings(self) -> bool {
        !self.is_importance_sampling()
    }

    fn as_str(self) -> &'static str {
        match self {
            InferenceEngine::ImportanceSampling => "importance_sampling",
            InferenceEngine::ImportanceSamplingWithInferenceNetwork => {
                "importance_sampling_with_inference_network"
            }
            InferenceEngine::LightweightMetropolisHastings => "lightweight_metropolis_hastings",
            InferenceEngine::RandomWalkMetropolisHastings => "random_walk_metropolis_hastings",
        }
    }
}

impl Display for InferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InferenceEngine {
    type Err = PplError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "importance_sampling" | "is" => Ok(InferenceEngine::ImportanceSampling),
            "importance_sampling_with_inference_network" | "ic" => {
                Ok(InferenceEngine::ImportanceSamplingWithInferenceNetwork)
            }
            "lightweight_metropolis_hastings" | "lmh" => {
                Ok(InferenceEngine::LightweightMetropolisHastings)
            }
            "random_walk_metropolis_hastings" | "rmh" => {
                Ok(InferenceEngine::RandomWalkMetropolisHastings)
            }
            other => Err(PplError::Config(format!("unknown inference engine: {}", other))),
        }
    }
}

impl FromStr for TraceMode {
    type Err = PplError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "prior" => Ok(TraceMode::Prior),
            "posterior" => Ok(TraceMode::Posterior),
            other => Err(PplError::Config(format!("unknown trace mode: {}", other))),
        }
    }
}

fn default_num_traces() -> usize {
    1000
}

/// Settings for one inference run, loadable from JSON.
///
/// ```rust,ignore
/// let config = InferenceConfig::from_json(r#"{
///     "engine": "lightweight_metropolis_hastings",
///     "num_traces": 5000,
///     "seed": 7,
///     "observe": { "obs1": [8.0], "obs2": [9.0] }
/// }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub engine: InferenceEngine,
    #[serde(default = "default_num_traces")]
    pub num_traces: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub prior_inflation: PriorInflation,
    #[serde(default)]
    pub observe: BTreeMap<String, Vec<f64>>,
}

impl InferenceConfig {
    pub fn new(engine: InferenceEngine, num_traces: usize) -> Self {
        Self {
            engine,
            num_traces,
            seed: None,
            prior_inflation: PriorInflation::Disabled,
            observe: BTreeMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self.observe.iter().find(|(_, v)| v.is_empty()) {
            return Err(PplError::Config(format!(
                "observed value for {} is empty",
                name
            )));
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_observe(mut self, name: &str, value: &[f64]) -> Self {
        self.observe.insert(name.to_string(), value.to_vec());
        self
    }

    pub fn observe_map(&self) -> ObserveMap {
        self.observe
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_str() {
        assert_eq!(
            "lmh".parse::<InferenceEngine>().unwrap(),
            InferenceEngine::LightweightMetropolisHastings
        );
        assert_eq!(
            "RANDOM_WALK_METROPOLIS_HASTINGS".parse::<InferenceEngine>().unwrap(),
            InferenceEngine::RandomWalkMetropolisHastings
        );
        assert!(matches!(
            "gibbs".parse::<InferenceEngine>(),
            Err(PplError::Config(_))
        ));
        assert_eq!(
            InferenceEngine::ImportanceSampling.to_string(),
            "importance_sampling"
        );
    }

    #[test]
    fn test_config_from_json() {
        let config = InferenceConfig::from_json(
            r#"{
                "engine": "importance_sampling",
                "num_traces": 20,
                "seed": 3,
                "observe": { "obs1": [8.0] }
            }"#,
        )
        .unwrap();
        assert_eq!(config.engine, InferenceEngine::ImportanceSampling);
        assert_eq!(config.num_traces, 20);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.prior_inflation, PriorInflation::Disabled);
        assert_eq!(config.observe_map()["obs1"][0], 8.0);
    }

    #[test]
    fn test_config_defaults() {
        let config =
            InferenceConfig::from_json(r#"{ "engine": "lightweight_metropolis_hastings" }"#)
                .unwrap();
        assert_eq!(config.num_traces, 1000);
        assert!(config.observe.is_empty());
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let err = InferenceConfig::from_json(r#"{ "engine": "hamiltonian" }"#).unwrap_err();
        assert!(matches!(err, PplError::Config(_)));

        let err = InferenceConfig::from_json(r#"{ "engine": "importance_sampling", "observe": { "x": [] } }"#)
            .unwrap_err();
        assert!(matches!(err, PplError::Config(_)));
    }
}
