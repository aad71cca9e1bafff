use rand::Rng;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::{InferenceEngine, ObserveMap};
use crate::context::{ExecutionContext, TraceSettings};
use crate::empirical::Empirical;
use crate::error::{PplError, Result};
use crate::generator::TraceGenerator;
use crate::model::Model;
use crate::trace::Trace;

/// Running counters of a Metropolis-Hastings chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChainStats {
    pub steps: usize,
    pub traces_accepted: usize,
    /// Controlled samples copied from the current state, over all steps.
    pub samples_reused: usize,
    /// Controlled samples in all candidates, over all steps.
    pub samples_all: usize,
}

impl ChainStats {
    pub fn acceptance_rate(&self) -> f64 {
        self.traces_accepted as f64 / self.steps.max(1) as f64
    }

    pub fn reuse_rate(&self) -> f64 {
        self.samples_reused as f64 / self.samples_all.max(1) as f64
    }
}

/// Log acceptance ratio of moving from `current` to `candidate`.
///
/// `site_transition_log_prob` is the term contributed by the redrawn site;
/// `None` means the candidate never visited it and the term is left out.
/// Samples of `current` are scored by their prior log-density, so a chain
/// may start from a trace drawn under a proposal or an inflated prior.
/// Returns `-inf` for a candidate with no controlled samples.
pub fn log_acceptance_ratio<R>(
    current: &Trace<R>,
    candidate: &Trace<R>,
    site_transition_log_prob: Option<f64>,
) -> f64 {
    if candidate.length_controlled == 0 {
        return f64::NEG_INFINITY;
    }
    let mut log_ratio = (current.length_controlled as f64).ln()
        - (candidate.length_controlled as f64).ln()
        + candidate.log_prob_observed
        - current.log_prob_observed;

    for sample in candidate.samples_controlled().filter(|s| s.reused) {
        let old = current
            .get_sample(&sample.address_suffixed)
            .map_or(f64::NEG_INFINITY, |s| s.log_prior);
        log_ratio += sample.log_prob - old;
    }

    if let Some(transition) = site_transition_log_prob {
        log_ratio += transition;
    }
    log_ratio
}

/// Single-site Metropolis-Hastings over traces.
///
/// Each step redraws one controlled site of the current trace, reuses every
/// other site whose address still matches, and accepts the candidate with
/// the usual MH probability. Supports both the lightweight (prior redraw)
/// and random-walk engines.
pub struct LightweightMH<M: Model> {
    generator: TraceGenerator<M>,
    current: Option<Trace<M::Output>>,
    stats: ChainStats,
}

impl<M: Model> LightweightMH<M> {
    pub fn new(
        model: M,
        ctx: ExecutionContext,
        engine: InferenceEngine,
        observe: ObserveMap,
    ) -> Result<Self> {
        if !engine.is_metropolis_hastings() {
            return Err(PplError::Config(format!(
                "{} is not a Metropolis-Hastings engine",
                engine
            )));
        }
        let settings = TraceSettings::posterior(engine).with_observe(observe);
        Ok(Self {
            generator: TraceGenerator::new(model, ctx, settings),
            current: None,
            stats: ChainStats::default(),
        })
    }

    /// Start the chain from `trace` instead of a fresh execution.
    pub fn with_initial_trace(mut self, trace: Trace<M::Output>) -> Result<Self> {
        if trace.length_controlled == 0 {
            return Err(PplError::NothingToResample);
        }
        self.current = Some(trace);
        Ok(self)
    }

    pub fn engine(&self) -> InferenceEngine {
        self.generator.settings().inference_engine
    }

    pub fn current(&self) -> Option<&Trace<M::Output>> {
        self.current.as_ref()
    }

    pub fn stats(&self) -> ChainStats {
        self.stats
    }

    pub fn into_context(self) -> ExecutionContext {
        self.generator.into_context()
    }

    fn initial_trace(&mut self) -> Result<Trace<M::Output>> {
        match self.current.take() {
            Some(trace) => Ok(trace),
            None => {
                let trace = self.generator.generate(None)?;
                if trace.length_controlled == 0 {
                    return Err(PplError::NothingToResample);
                }
                debug!(length = trace.length, "adopted initial trace");
                Ok(trace)
            }
        }
    }

    /// Advance the chain by one step. Returns whether the candidate was
    /// accepted.
    pub fn step(&mut self) -> Result<bool> {
        let current = self.initial_trace()?;
        let candidate = match self.generator.generate(Some(&current)) {
            Ok(candidate) => candidate,
            Err(err) => {
                self.current = Some(current);
                return Err(err);
            }
        };

        let transition = self.generator.context().site_transition_log_prob();
        if transition.is_none() {
            warn!(
                model = self.generator.model().name(),
                "candidate did not revisit the Metropolis-Hastings site; \
                 ensure the model is deterministic apart from sample calls"
            );
        }
        let log_ratio = log_acceptance_ratio(&current, &candidate, transition);

        let reused = candidate.samples_controlled().filter(|s| s.reused).count();
        self.stats.steps += 1;
        self.stats.samples_reused += reused;
        self.stats.samples_all += candidate.length_controlled;

        let u: f64 = self.generator.context_mut().rng_mut().gen();
        let accepted = log_ratio.is_finite() && u.ln() < log_ratio;
        trace!(step = self.stats.steps, log_ratio, accepted, reused, "mh step");

        if accepted {
            self.stats.traces_accepted += 1;
            self.current = Some(candidate);
        } else {
            self.current = Some(current);
        }
        Ok(accepted)
    }

    /// Run `num_traces` steps and return the chain of visited states.
    ///
    /// The chain always has `num_traces` elements; a rejected step repeats
    /// the current trace.
    pub fn run(&mut self, num_traces: usize) -> Result<Empirical<Trace<M::Output>>> {
        let mut chain = Vec::with_capacity(num_traces);
        for _ in 0..num_traces {
            self.step()?;
            if let Some(current) = &self.current {
                chain.push(current.clone());
            }
        }

        let kind = match self.engine() {
            InferenceEngine::RandomWalkMetropolisHastings => "random-walk",
            _ => "lightweight",
        };
        let name = format!(
            "Posterior, {} Metropolis Hastings, num_traces={}, accepted={:.2}%, sample_reuse={:.2}%",
            kind,
            num_traces,
            100.0 * self.stats.acceptance_rate(),
            100.0 * self.stats.reuse_rate()
        );
        debug!(
            model = self.generator.model().name(),
            accepted = self.stats.traces_accepted,
            steps = self.stats.steps,
            "chain finished"
        );
        Ok(Empirical::from_values(chain, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SampleOptions;
    use crate::distributions::{scalar, Bernoulli, Distribution, Normal, Uniform, UniformDiscrete};
    use crate::model::model_fn;

    fn generate<M: Model>(model: M, engine: InferenceEngine, seed: u64) -> Trace<M::Output> {
        TraceGenerator::new(
            model,
            ExecutionContext::seed_from_u64(seed),
            TraceSettings::posterior(engine),
        )
        .generate(None)
        .unwrap()
    }

    #[test]
    fn test_identical_candidate_has_zero_ratio() {
        let model = model_fn("m", |ctx: &mut ExecutionContext| {
            let d: Distribution = Normal::new(0.0, 1.0)?.into();
            let x = ctx.sample(&d, None)?;
            ctx.observe(&Normal::new(x[0], 1.0)?.into(), Some(&scalar(0.5)), None)?;
            Ok(x[0])
        });
        let trace = generate(&model, InferenceEngine::LightweightMetropolisHastings, 7);
        let mut candidate = trace.clone();
        for s in &mut candidate.samples {
            s.reused = true;
        }
        assert_eq!(log_acceptance_ratio(&trace, &candidate, Some(0.0)), 0.0);
        assert_eq!(log_acceptance_ratio(&trace, &candidate, None), 0.0);
    }

    #[test]
    fn test_current_side_is_scored_under_the_prior() {
        let model = model_fn("m", |ctx: &mut ExecutionContext| {
            let x = ctx.sample(&Normal::new(0.0, 1.0)?.into(), Some("x"))?;
            let y = ctx.sample(&Normal::new(x[0], 1.0)?.into(), Some("y"))?;
            Ok(y[0])
        });
        let mut current = generate(&model, InferenceEngine::LightweightMetropolisHastings, 2);
        let mut candidate = current.clone();
        for s in &mut candidate.samples {
            s.reused = true;
        }
        // As if `current` came from a proposal: log_prob no longer equals the prior.
        for s in &mut current.samples {
            s.log_prob -= 3.0;
        }
        assert_eq!(log_acceptance_ratio(&current, &candidate, Some(0.0)), 0.0);
    }

    #[test]
    fn test_empty_candidate_is_rejected() {
        let model = model_fn("m", |ctx: &mut ExecutionContext| {
            Ok(ctx.sample(&Normal::new(0.0, 1.0)?.into(), None)?[0])
        });
        let trace = generate(&model, InferenceEngine::LightweightMetropolisHastings, 1);
        let empty = Trace::<()>::new().with_result(0.0, None);
        assert_eq!(log_acceptance_ratio(&trace, &empty, Some(0.0)), f64::NEG_INFINITY);
    }

    #[test]
    fn test_single_point_support_always_accepts() {
        let model = model_fn("point", |ctx: &mut ExecutionContext| {
            let d: Distribution = UniformDiscrete::new(4, 1)?.into();
            Ok(ctx.sample(&d, None)?[0])
        });
        let mut mh = LightweightMH::new(
            model,
            ExecutionContext::seed_from_u64(3),
            InferenceEngine::LightweightMetropolisHastings,
            ObserveMap::new(),
        )
        .unwrap();
        for _ in 0..20 {
            assert!(mh.step().unwrap());
        }
        assert_eq!(mh.stats().traces_accepted, 20);
        assert_eq!(mh.current().and_then(|t| t.get_result()).copied(), Some(4.0));
    }

    #[test]
    fn test_chain_length_and_counters() {
        let model = model_fn("two", |ctx: &mut ExecutionContext| {
            let a = ctx.sample(&Normal::new(0.0, 1.0)?.into(), Some("a"))?[0];
            let b = ctx.sample(&Uniform::new(-1.0, 1.0)?.into(), Some("b"))?[0];
            ctx.observe(&Normal::new(a + b, 0.5)?.into(), Some(&scalar(0.3)), Some("y"))?;
            Ok(a + b)
        });
        let mut mh = LightweightMH::new(
            model,
            ExecutionContext::seed_from_u64(11),
            InferenceEngine::RandomWalkMetropolisHastings,
            ObserveMap::new(),
        )
        .unwrap();
        let chain = mh.run(50).unwrap();
        let stats = mh.stats();

        assert_eq!(chain.len(), 50);
        assert_eq!(stats.steps, 50);
        // Two controlled sites, one of which is redrawn per step.
        assert_eq!(stats.samples_all, 100);
        assert_eq!(stats.samples_reused, 50);
        assert!(stats.traces_accepted <= 50);
        assert!(chain.name().contains("random-walk"));
    }

    #[test]
    fn test_rejects_importance_engine() {
        let model = model_fn("m", |_: &mut ExecutionContext| Ok(0.0));
        let result = LightweightMH::new(
            model,
            ExecutionContext::seed_from_u64(0),
            InferenceEngine::ImportanceSampling,
            ObserveMap::new(),
        );
        assert!(matches!(result, Err(PplError::Config(_))));
    }

    #[test]
    fn test_nothing_to_resample() {
        let model = model_fn("deterministic", |_: &mut ExecutionContext| Ok(1.0));
        let mut mh = LightweightMH::new(
            model,
            ExecutionContext::seed_from_u64(0),
            InferenceEngine::LightweightMetropolisHastings,
            ObserveMap::new(),
        )
        .unwrap();
        assert!(matches!(mh.step(), Err(PplError::NothingToResample)));
    }

    #[test]
    fn test_random_walk_with_shifting_uniform_bounds() {
        // The uncontrolled draw moves the uniform far away from its old value.
        let model = model_fn("shifting", |ctx: &mut ExecutionContext| {
            let u = ctx.sample_with(
                &Normal::new(0.0, 1.0)?.into(),
                SampleOptions::new().address("u").uncontrolled(),
            )?[0];
            let b = ctx.sample(&Uniform::new(100.0 * u, 100.0 * u + 1.0)?.into(), Some("b"))?[0];
            Ok((u, b))
        });
        let mut mh = LightweightMH::new(
            model,
            ExecutionContext::seed_from_u64(17),
            InferenceEngine::RandomWalkMetropolisHastings,
            ObserveMap::new(),
        )
        .unwrap();
        let chain = mh.run(20).unwrap();

        assert_eq!(chain.len(), 20);
        for (u, b) in chain.results().into_values() {
            assert!(b >= 100.0 * u && b <= 100.0 * u + 1.0, "b={} outside support for u={}", b, u);
        }
    }

    #[test]
    fn test_step_survives_a_vanished_site() {
        // Which site is sampled depends on an uncontrolled coin.
        let model = model_fn("branch", |ctx: &mut ExecutionContext| {
            let coin: Distribution = Bernoulli::new(0.5)?.into();
            let d: Distribution = Normal::new(0.0, 1.0)?.into();
            let heads = ctx.sample_with(&coin, SampleOptions::new().address("coin").uncontrolled())?[0];
            let x = if heads > 0.5 {
                ctx.sample(&d, Some("heads"))?
            } else {
                ctx.sample(&d, Some("tails"))?
            };
            Ok(x[0])
        });
        let mut mh = LightweightMH::new(
            model,
            ExecutionContext::seed_from_u64(5),
            InferenceEngine::LightweightMetropolisHastings,
            ObserveMap::new(),
        )
        .unwrap();

        let mut vanished = 0;
        for _ in 0..100 {
            let accepted = mh.step().unwrap();
            if mh.generator.context().site_transition_log_prob().is_none() {
                vanished += 1;
                // Nothing reused and no transition term: the ratio is 0.
                assert!(accepted);
            }
            let current = mh.current().unwrap();
            assert_eq!(current.length, 2);
            assert_eq!(current.length_controlled, 1);
        }
        assert!(vanished > 0);
        assert_eq!(mh.stats().steps, 100);
        assert_eq!(mh.run(10).unwrap().len(), 10);
    }
}
