use std::collections::HashMap;
use std::panic::Location;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::address::{Address, AddressCounter, Site, SuffixedAddress};
use crate::config::{InferenceConfig, InferenceEngine, ObserveMap, PriorInflation, TraceMode};
use crate::distributions::{Distribution, Value};
use crate::error::{PplError, Result};
use crate::proposal::ProposalSource;
use crate::trace::{Observation, Sample, Trace};

/// How the next trace should be generated.
#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub trace_mode: TraceMode,
    pub prior_inflation: PriorInflation,
    pub inference_engine: InferenceEngine,
    pub observe: ObserveMap,
}

impl TraceSettings {
    pub fn prior() -> Self {
        Self {
            trace_mode: TraceMode::Prior,
            prior_inflation: PriorInflation::Disabled,
            inference_engine: InferenceEngine::ImportanceSampling,
            observe: ObserveMap::new(),
        }
    }

    pub fn posterior(inference_engine: InferenceEngine) -> Self {
        Self {
            trace_mode: TraceMode::Posterior,
            prior_inflation: PriorInflation::Disabled,
            inference_engine,
            observe: ObserveMap::new(),
        }
    }

    pub fn with_prior_inflation(mut self, prior_inflation: PriorInflation) -> Self {
        self.prior_inflation = prior_inflation;
        self
    }

    pub fn with_observe(mut self, observe: ObserveMap) -> Self {
        self.observe = observe;
        self
    }

    fn uses_proposal_source(&self) -> bool {
        self.trace_mode == TraceMode::Posterior
            && self.inference_engine == InferenceEngine::ImportanceSamplingWithInferenceNetwork
    }

    fn uses_reuse(&self) -> bool {
        self.trace_mode == TraceMode::Posterior && self.inference_engine.is_metropolis_hastings()
    }

    fn weighs_importance(&self) -> bool {
        self.trace_mode == TraceMode::Posterior && self.inference_engine.is_importance_sampling()
    }
}

/// Per-call options for `sample_with`.
#[derive(Debug, Clone, Copy)]
pub struct SampleOptions<'a> {
    /// Overrides the call site as the static identity of the site.
    pub address: Option<&'a str>,
    pub name: Option<&'a str>,
    pub controlled: bool,
}

impl Default for SampleOptions<'_> {
    fn default() -> Self {
        Self {
            address: None,
            name: None,
            controlled: true,
        }
    }
}

impl<'a> SampleOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: &'a str) -> Self {
        self.address = Some(address);
        self
    }

    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Draw from the prior in every mode and keep the site out of MH.
    pub fn uncontrolled(mut self) -> Self {
        self.controlled = false;
        self
    }
}

/// State of the trace currently being recorded.
struct OpenTrace {
    settings: TraceSettings,
    trace: Trace<()>,
    counter: AddressCounter,
    /// Running sum of `log p(x) - log q(x)` over sampled values.
    log_weight: f64,
    /// Controlled samples of the current MH state, by suffixed address.
    reuse: HashMap<SuffixedAddress, Sample>,
    mh_site: Option<SuffixedAddress>,
}

/// Services every `sample`/`observe` call of one model execution.
///
/// A context is owned by a trace generator and handed to the model by
/// `&mut`. Between `begin_trace` and `end_trace` exactly one trace is open;
/// outside that bracket `sample` and `observe` fail with `NoActiveTrace`.
pub struct ExecutionContext {
    rng: StdRng,
    proposal: Option<Box<dyn ProposalSource>>,
    open: Option<OpenTrace>,
    site_transition_log_prob: Option<f64>,
}

impl ExecutionContext {
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng,
            proposal: None,
            open: None,
            site_transition_log_prob: None,
        }
    }

    pub fn seed_from_u64(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Seeded from `config.seed`, or from OS entropy when unset.
    pub fn from_config(config: &InferenceConfig) -> Self {
        match config.seed {
            Some(seed) => Self::seed_from_u64(seed),
            None => Self::new(StdRng::from_entropy()),
        }
    }

    pub fn with_proposal_source(mut self, proposal: Box<dyn ProposalSource>) -> Self {
        self.proposal = Some(proposal);
        self
    }

    pub fn set_proposal_source(&mut self, proposal: Option<Box<dyn ProposalSource>>) {
        self.proposal = proposal;
    }

    pub fn has_proposal_source(&self) -> bool {
        self.proposal.is_some()
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Transition log-probability contributed by the resampled MH site during
    /// the last trace, or `None` if that site was never visited.
    pub fn site_transition_log_prob(&self) -> Option<f64> {
        self.site_transition_log_prob
    }

    /// Open a new trace.
    ///
    /// With `current` supplied in a Metropolis-Hastings mode, its controlled
    /// samples become the reuse table and one of them is chosen uniformly as
    /// the site to redraw.
    pub fn begin_trace<R>(
        &mut self,
        settings: TraceSettings,
        current: Option<&Trace<R>>,
    ) -> Result<()> {
        if self.open.is_some() {
            return Err(PplError::TraceAlreadyOpen);
        }
        if settings.uses_proposal_source() && self.proposal.is_none() {
            return Err(PplError::MissingProposalSource(
                settings.inference_engine.to_string(),
            ));
        }
        self.site_transition_log_prob = None;

        let mut reuse = HashMap::new();
        let mut mh_site = None;
        if let (true, Some(current)) = (settings.uses_reuse(), current) {
            let controlled: Vec<&Sample> = current.samples_controlled().collect();
            if !controlled.is_empty() {
                let i = self.rng.gen_range(0..controlled.len());
                mh_site = Some(controlled[i].address_suffixed.clone());
            }
            reuse = controlled
                .into_iter()
                .map(|s| (s.address_suffixed.clone(), s.clone()))
                .collect();
        }

        let mut trace = Trace::new();
        if settings.uses_proposal_source() {
            if let Some(proposal) = self.proposal.as_mut() {
                trace.observes_embedding = proposal.embed_observations(&settings.observe);
            }
        }

        self.open = Some(OpenTrace {
            settings,
            trace,
            counter: AddressCounter::new(),
            log_weight: 0.0,
            reuse,
            mh_site,
        });
        Ok(())
    }

    /// Close the open trace and compute its derived scalars.
    pub fn end_trace<R>(&mut self, result: R) -> Result<Trace<R>> {
        let open = self.open.take().ok_or(PplError::NoActiveTrace)?;
        let log_importance_weight = open
            .settings
            .weighs_importance()
            .then(|| open.log_weight + open.trace.log_prob_observed);
        Ok(open.trace.with_result(result, log_importance_weight))
    }

    /// Drop the open trace, if any, without producing it.
    pub fn abort_trace(&mut self) {
        self.open = None;
    }

    /// Draw a value for a controlled site identified by its call site, or by
    /// `address_hint` when given.
    #[track_caller]
    pub fn sample(&mut self, distribution: &Distribution, address_hint: Option<&str>) -> Result<Value> {
        let options = SampleOptions {
            address: address_hint,
            ..SampleOptions::default()
        };
        self.sample_at(distribution, options, Location::caller())
    }

    #[track_caller]
    pub fn sample_with(&mut self, distribution: &Distribution, options: SampleOptions<'_>) -> Result<Value> {
        self.sample_at(distribution, options, Location::caller())
    }

    fn sample_at(
        &mut self,
        distribution: &Distribution,
        options: SampleOptions<'_>,
        location: &'static Location<'static>,
    ) -> Result<Value> {
        let ExecutionContext {
            rng,
            proposal,
            open,
            site_transition_log_prob,
        } = self;
        let open = open.as_mut().ok_or(PplError::NoActiveTrace)?;

        let site = Site::resolve(options.address, location);
        let address = Address::new(&site, &distribution.address_suffix());
        let address_suffixed = open.counter.next(&address);
        let mut distribution = distribution.clone();

        let draw = if !options.controlled {
            draw_prior(&distribution, rng)
        } else {
            match open.settings.trace_mode {
                TraceMode::Prior => match open.settings.prior_inflation {
                    PriorInflation::Enabled => draw_inflated(&distribution, rng),
                    PriorInflation::Disabled => draw_prior(&distribution, rng),
                },
                TraceMode::Posterior => match open.settings.inference_engine {
                    InferenceEngine::ImportanceSampling => draw_prior(&distribution, rng),
                    InferenceEngine::ImportanceSamplingWithInferenceNetwork => {
                        let proposal = proposal
                            .as_mut()
                            .ok_or_else(|| PplError::MissingProposalSource(
                                open.settings.inference_engine.to_string(),
                            ))?;
                        let params = proposal.propose(
                            &open.trace.samples,
                            open.trace.observes_embedding.as_ref(),
                            &address_suffixed,
                            &distribution,
                        )?;
                        distribution.set_proposal_params(&params)?;
                        draw_proposal(&distribution, rng)
                    }
                    engine => {
                        if open.mh_site.as_ref() == Some(&address_suffixed) {
                            let (draw, transition) = redraw_site(
                                engine,
                                &distribution,
                                open.reuse.get(&address_suffixed),
                                rng,
                            );
                            *site_transition_log_prob = Some(transition);
                            draw
                        } else {
                            reuse_or_draw(&distribution, open.reuse.get(&address_suffixed), rng)
                        }
                    }
                },
            }
        };

        open.log_weight += draw.log_prior - draw.log_prob;
        trace!(
            address = %address_suffixed,
            log_prob = draw.log_prob,
            reused = draw.reused,
            "sample"
        );

        let value = draw.value.clone();
        open.trace.add_sample(Sample {
            address,
            address_suffixed,
            name: options.name.map(str::to_string),
            distribution,
            value: draw.value,
            log_prob: draw.log_prob,
            log_prior: draw.log_prior,
            controlled: options.controlled,
            reused: draw.reused,
        })?;
        Ok(value)
    }

    /// Condition on `value` under `distribution`.
    ///
    /// An observe override registered under `name` takes precedence over
    /// `value`. With neither, a value is drawn from `distribution`. Returns
    /// the value that was scored.
    #[track_caller]
    pub fn observe(
        &mut self,
        distribution: &Distribution,
        value: Option<&Value>,
        name: Option<&str>,
    ) -> Result<Value> {
        let location = Location::caller();
        let open = self.open.as_mut().ok_or(PplError::NoActiveTrace)?;

        let site = Site::resolve(name, location);
        let address = Address::new(&site, &distribution.address_suffix());
        let address_suffixed = open.counter.next(&address);

        let value = match name.and_then(|n| open.settings.observe.get(n)) {
            Some(overridden) => overridden.clone(),
            None => match value {
                Some(v) => v.clone(),
                None => distribution.sample(&mut self.rng),
            },
        };
        let log_prob = distribution.log_prob(&value);
        trace!(address = %address_suffixed, log_prob, "observe");

        open.trace.add_observation(Observation {
            address,
            address_suffixed,
            name: name.map(str::to_string),
            distribution: distribution.clone(),
            value: value.clone(),
            log_prob,
        });
        Ok(value)
    }
}

/// Outcome of servicing one `sample` call.
struct Draw {
    value: Value,
    log_prob: f64,
    log_prior: f64,
    reused: bool,
}

fn draw_prior(distribution: &Distribution, rng: &mut StdRng) -> Draw {
    let value = distribution.sample(rng);
    let log_prob = distribution.log_prob(&value);
    Draw {
        value,
        log_prob,
        log_prior: log_prob,
        reused: false,
    }
}

fn draw_inflated(distribution: &Distribution, rng: &mut StdRng) -> Draw {
    let inflated = distribution.inflated();
    let value = inflated.sample(rng);
    Draw {
        log_prob: inflated.log_prob(&value),
        log_prior: distribution.log_prob(&value),
        value,
        reused: false,
    }
}

fn draw_proposal(distribution: &Distribution, rng: &mut StdRng) -> Draw {
    let value = distribution.sample_proposal(rng);
    Draw {
        log_prob: distribution.proposal_log_prob(&value),
        log_prior: distribution.log_prob(&value),
        value,
        reused: false,
    }
}

/// Copy the value of the previous sample at this address when it still fits
/// the distribution; otherwise draw fresh from the prior.
fn reuse_or_draw(distribution: &Distribution, previous: Option<&Sample>, rng: &mut StdRng) -> Draw {
    match previous {
        Some(prev) if distribution.supports(&prev.value) => {
            let log_prob = distribution.log_prob(&prev.value);
            Draw {
                value: prev.value.clone(),
                log_prob,
                log_prior: log_prob,
                reused: true,
            }
        }
        _ => draw_prior(distribution, rng),
    }
}

/// Redraw the chosen MH site and return the draw with its transition
/// log-probability.
///
/// Lightweight MH redraws from the prior, whose terms cancel in the
/// acceptance ratio. Random-walk MH moves with a local kernel around the
/// previous value where the family has one.
fn redraw_site(
    engine: InferenceEngine,
    distribution: &Distribution,
    previous: Option<&Sample>,
    rng: &mut StdRng,
) -> (Draw, f64) {
    if engine == InferenceEngine::RandomWalkMetropolisHastings {
        let kernel = previous.and_then(|prev| {
            distribution
                .random_walk_kernel(&prev.value)
                .map(|forward| (prev, forward))
        });
        if let Some((prev, forward)) = kernel {
            let value = forward.sample(rng);
            let log_prob = distribution.log_prob(&value);
            let reverse = distribution
                .random_walk_kernel(&value)
                .map_or(f64::NEG_INFINITY, |k| k.log_prob(&prev.value));
            let transition = reverse + log_prob - forward.log_prob(&value) - prev.log_prior;
            let draw = Draw {
                value,
                log_prob,
                log_prior: log_prob,
                reused: false,
            };
            return (draw, transition);
        }
    }
    (draw_prior(distribution, rng), 0.0)
}
