use tracing::debug;

use crate::config::TraceMode;
use crate::context::{ExecutionContext, TraceSettings};
use crate::empirical::Empirical;
use crate::error::{PplError, Result};
use crate::generator::TraceGenerator;
use crate::model::Model;
use crate::trace::Trace;

/// Collects independent traces with their log importance weights.
///
/// Runs with `TraceMode::Prior` produce an unweighted collection. Weights of
/// posterior runs are left unnormalized.
pub struct ImportanceSampler<M: Model> {
    generator: TraceGenerator<M>,
}

impl<M: Model> ImportanceSampler<M> {
    pub fn new(model: M, ctx: ExecutionContext, settings: TraceSettings) -> Result<Self> {
        if settings.trace_mode == TraceMode::Posterior
            && !settings.inference_engine.is_importance_sampling()
        {
            return Err(PplError::Config(format!(
                "{} is not an importance sampling engine",
                settings.inference_engine
            )));
        }
        Ok(Self {
            generator: TraceGenerator::new(model, ctx, settings),
        })
    }

    pub fn generator(&self) -> &TraceGenerator<M> {
        &self.generator
    }

    pub fn into_context(self) -> ExecutionContext {
        self.generator.into_context()
    }

    /// Execute the model exactly `num_traces` times in sequence.
    ///
    /// The first model error aborts the whole run.
    pub fn run(&mut self, num_traces: usize) -> Result<Empirical<Trace<M::Output>>> {
        let settings = self.generator.settings().clone();
        let mut traces = Vec::with_capacity(num_traces);
        for i in 0..num_traces {
            let trace = self.generator.generate(None).map_err(|err| {
                debug!(index = i, error = %err, "importance sampling aborted");
                err
            })?;
            traces.push(trace);
        }

        let empirical = match settings.trace_mode {
            TraceMode::Prior => {
                Empirical::from_values(traces, format!("Prior, num_traces={}", num_traces))
            }
            TraceMode::Posterior => {
                let name = format!(
                    "Posterior, {}, num_traces={}",
                    settings.inference_engine, num_traces
                );
                let pairs = traces
                    .into_iter()
                    .map(|t| {
                        let lw = t.log_importance_weight.unwrap_or(f64::NEG_INFINITY);
                        (t, lw)
                    })
                    .collect();
                Empirical::from_weighted(pairs, name)
            }
        };

        debug!(
            model = self.generator.model().name(),
            num_traces,
            ess = empirical.effective_sample_size(),
            "importance sampling finished"
        );
        Ok(empirical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceEngine;
    use crate::distributions::{scalar, Distribution, Normal};
    use crate::model::model_fn;
    use approx::assert_relative_eq;

    fn model() -> impl Model<Output = f64> {
        model_fn("gaussian", |ctx: &mut ExecutionContext| {
            let prior: Distribution = Normal::new(0.0, 1.0)?.into();
            let mu = ctx.sample(&prior, Some("mu"))?[0];
            let likelihood: Distribution = Normal::new(mu, 1.0)?.into();
            ctx.observe(&likelihood, Some(&scalar(1.0)), Some("obs"))?;
            Ok(mu)
        })
    }

    #[test]
    fn test_run_produces_exactly_n_traces() {
        let mut sampler = ImportanceSampler::new(
            model(),
            ExecutionContext::seed_from_u64(1),
            TraceSettings::posterior(InferenceEngine::ImportanceSampling),
        )
        .unwrap();
        let empirical = sampler.run(25).unwrap();
        assert_eq!(empirical.len(), 25);
        assert_eq!(sampler.generator().generated(), 25);

        let lw = empirical.log_weights().unwrap();
        for (t, w) in empirical.values().iter().zip(lw) {
            assert_relative_eq!(*w, t.log_prob_observed, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_prior_run_is_unweighted() {
        let mut sampler = ImportanceSampler::new(
            model(),
            ExecutionContext::seed_from_u64(2),
            TraceSettings::prior(),
        )
        .unwrap();
        let empirical = sampler.run(10).unwrap();
        assert!(!empirical.is_weighted());
        assert!(empirical.values().iter().all(|t| t.log_importance_weight.is_none()));
    }

    #[test]
    fn test_rejects_mh_engine() {
        let result = ImportanceSampler::new(
            model(),
            ExecutionContext::seed_from_u64(3),
            TraceSettings::posterior(InferenceEngine::LightweightMetropolisHastings),
        );
        assert!(matches!(result, Err(PplError::Config(_))));
    }

    #[test]
    fn test_model_error_aborts_run() {
        let failing = model_fn("failing", |ctx: &mut ExecutionContext| {
            let d: Distribution = Normal::new(0.0, 1.0)?.into();
            let x = ctx.sample(&d, None)?[0];
            if x > 0.0 {
                return Err(PplError::Model("positive draw".to_string()));
            }
            Ok(x)
        });
        let mut sampler =
            ImportanceSampler::new(failing, ExecutionContext::seed_from_u64(4), TraceSettings::prior())
                .unwrap();
        assert!(matches!(sampler.run(200), Err(PplError::Model(_))));
    }
}
