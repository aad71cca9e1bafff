//! Inference procedures over traces: importance sampling and single-site
//! Metropolis-Hastings.

pub mod importance;
pub mod lmh;

pub use importance::ImportanceSampler;
pub use lmh::{log_acceptance_ratio, ChainStats, LightweightMH};

use tracing::debug;

use crate::config::{InferenceConfig, InferenceEngine, PriorInflation};
use crate::context::{ExecutionContext, TraceSettings};
use crate::empirical::Empirical;
use crate::error::{PplError, Result};
use crate::model::Model;
use crate::trace::Trace;

/// Sample `num_traces` traces from the prior.
pub fn prior_traces<M: Model>(
    model: M,
    ctx: ExecutionContext,
    num_traces: usize,
    prior_inflation: PriorInflation,
) -> Result<Empirical<Trace<M::Output>>> {
    let settings = TraceSettings::prior().with_prior_inflation(prior_inflation);
    ImportanceSampler::new(model, ctx, settings)?.run(num_traces)
}

/// Approximate the posterior with the engine named in `config`.
///
/// Importance sampling engines return weighted traces; Metropolis-Hastings
/// engines return the chain, optionally started from `initial_trace`.
/// Fails before running the model if the inference-network engine is
/// requested on a context without a proposal source.
pub fn posterior_traces<M: Model>(
    model: M,
    ctx: ExecutionContext,
    config: &InferenceConfig,
    initial_trace: Option<Trace<M::Output>>,
) -> Result<Empirical<Trace<M::Output>>> {
    config.validate()?;
    let engine = config.engine;
    if engine == InferenceEngine::ImportanceSamplingWithInferenceNetwork
        && !ctx.has_proposal_source()
    {
        return Err(PplError::MissingProposalSource(engine.to_string()));
    }
    debug!(model = model.name(), %engine, num_traces = config.num_traces, "posterior");

    if engine.is_importance_sampling() {
        let settings = TraceSettings::posterior(engine).with_observe(config.observe_map());
        ImportanceSampler::new(model, ctx, settings)?.run(config.num_traces)
    } else {
        let mut mh = LightweightMH::new(model, ctx, engine, config.observe_map())?;
        if let Some(trace) = initial_trace {
            mh = mh.with_initial_trace(trace)?;
        }
        mh.run(config.num_traces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{scalar, Distribution, Normal};
    use crate::model::model_fn;

    #[test]
    fn test_missing_proposal_source_fails_before_running() {
        let model = model_fn("never", |_: &mut ExecutionContext| -> Result<f64> {
            panic!("model must not run")
        });
        let config = InferenceConfig::new(InferenceEngine::ImportanceSamplingWithInferenceNetwork, 10);
        let result = posterior_traces(model, ExecutionContext::seed_from_u64(0), &config, None);
        assert!(matches!(result, Err(PplError::MissingProposalSource(_))));
    }

    #[test]
    fn test_dispatch_by_engine() {
        let model = model_fn("gaussian", |ctx: &mut ExecutionContext| {
            let prior: Distribution = Normal::new(0.0, 1.0)?.into();
            let mu = ctx.sample(&prior, Some("mu"))?[0];
            ctx.observe(&Normal::new(mu, 1.0)?.into(), Some(&scalar(0.0)), Some("obs"))?;
            Ok(mu)
        });

        let config = InferenceConfig::new(InferenceEngine::ImportanceSampling, 15).with_seed(1);
        let is = posterior_traces(&model, ExecutionContext::from_config(&config), &config, None)
            .unwrap();
        assert_eq!(is.len(), 15);
        assert!(is.is_weighted());

        let config = InferenceConfig::new(InferenceEngine::LightweightMetropolisHastings, 15)
            .with_seed(1);
        let mh = posterior_traces(&model, ExecutionContext::from_config(&config), &config, None)
            .unwrap();
        assert_eq!(mh.len(), 15);
        assert!(!mh.is_weighted());
        assert!(mh.name().contains("lightweight"));

        let prior = prior_traces(&model, ExecutionContext::seed_from_u64(2), 5, PriorInflation::Enabled)
            .unwrap();
        assert_eq!(prior.len(), 5);
        assert_eq!(prior.results().len(), 5);
    }
}
