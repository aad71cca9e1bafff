use std::fmt::{Debug, Display};

use ndarray::Array1;
use rand::distributions::{Distribution as RandDistribution, WeightedIndex};
use rand::{Rng, RngCore};
use statrs::distribution::{Continuous, ContinuousCDF};

use crate::error::{PplError, Result};

/// A drawn or observed value. Scalars are vectors of length one.
pub type Value = Array1<f64>;

/// Build a length-one value.
pub fn scalar(x: f64) -> Value {
    Array1::from_elem(1, x)
}

fn invalid<E: Display>(family: &'static str) -> impl Fn(E) -> PplError {
    move |e| PplError::InvalidParameter {
        family,
        reason: e.to_string(),
    }
}

fn check_arity(family: &'static str, params: &[f64], expected: usize) -> Result<()> {
    if params.len() != expected {
        return Err(PplError::InvalidProposalParams {
            family,
            expected,
            got: params.len(),
        });
    }
    Ok(())
}

/// Read a value as a single finite float.
fn as_scalar(value: &Value) -> Option<f64> {
    match value.as_slice() {
        Some([x]) if x.is_finite() => Some(*x),
        _ => None,
    }
}

/// Read a value as an index into `0..size`.
fn as_index(value: &Value, size: usize) -> Option<usize> {
    let x = as_scalar(value)?;
    if x.fract() != 0.0 || x < 0.0 || x >= size as f64 {
        return None;
    }
    Some(x as usize)
}

fn scalar_ln_pdf<D: Continuous<f64, f64>>(dist: &D, value: &Value) -> f64 {
    as_scalar(value).map_or(f64::NEG_INFINITY, |x| dist.ln_pdf(x))
}

/// Normalized probability vector plus a sampler over its indices.
#[derive(Debug, Clone)]
struct Weights {
    probs: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl Weights {
    fn new(family: &'static str, probs: &[f64]) -> Result<Self> {
        if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(PplError::InvalidParameter {
                family,
                reason: "probabilities must be finite and non-negative".into(),
            });
        }
        let total: f64 = probs.iter().sum();
        let index = WeightedIndex::new(probs).map_err(invalid(family))?;
        Ok(Self {
            probs: probs.iter().map(|p| p / total).collect(),
            index,
        })
    }

    fn uniform(family: &'static str, size: usize) -> Result<Self> {
        Self::new(family, &vec![1.0; size])
    }

    fn draw(&self, rng: &mut dyn RngCore) -> usize {
        self.index.sample(rng)
    }

    fn ln_pmf(&self, k: Option<usize>) -> f64 {
        k.map_or(f64::NEG_INFINITY, |k| self.probs[k].ln())
    }
}

/// Beta distribution in the mode/certainty parametrization, stretched onto
/// `[low, high]`. Certainty must be at least 2.
#[derive(Debug, Clone)]
struct ModeCertainty {
    low: f64,
    high: f64,
    beta: statrs::distribution::Beta,
}

impl ModeCertainty {
    fn new(family: &'static str, low: f64, high: f64, mode: f64, certainty: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&mode) || !(certainty >= 2.0) {
            return Err(PplError::InvalidParameter {
                family,
                reason: format!("proposal mode {} / certainty {} out of range", mode, certainty),
            });
        }
        let a = mode * (certainty - 2.0) + 1.0;
        let b = (1.0 - mode) * (certainty - 2.0) + 1.0;
        let beta = statrs::distribution::Beta::new(a, b).map_err(invalid(family))?;
        Ok(Self { low, high, beta })
    }

    fn draw(&self, rng: &mut dyn RngCore) -> f64 {
        self.low + (self.high - self.low) * self.beta.sample(rng)
    }

    fn ln_pdf(&self, x: f64) -> f64 {
        let width = self.high - self.low;
        self.beta.ln_pdf((x - self.low) / width) - width.ln()
    }
}

/// Capability set shared by every prior family.
///
/// A family samples and scores under its prior. Once proposal parameters have
/// been set it can also sample and score under the proposal; until then the
/// proposal operations fall back to the prior.
pub trait PriorFamily: Debug + Clone {
    const NAME: &'static str;

    /// Suffix appended to a site identity to form its address. Includes any
    /// prior parameter that changes the shape of the value.
    fn address_suffix(&self) -> String {
        Self::NAME.to_string()
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Value;

    fn log_prob(&self, value: &Value) -> f64;

    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()>;

    fn has_proposal(&self) -> bool;

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value;

    fn proposal_log_prob(&self, value: &Value) -> f64;

    /// Widened version of the prior, used when prior inflation is enabled.
    fn inflated(&self) -> Self {
        self.clone()
    }
}

/// Diagonal Gaussian. Scalar normals have dimension one.
#[derive(Debug, Clone)]
pub struct Normal {
    mean: Vec<f64>,
    stddev: Vec<f64>,
    prior: Vec<statrs::distribution::Normal>,
    proposal: Option<Vec<statrs::distribution::Normal>>,
}

impl Normal {
    pub fn new(mean: f64, stddev: f64) -> Result<Self> {
        Self::diagonal(&[mean], &[stddev])
    }

    pub fn diagonal(mean: &[f64], stddev: &[f64]) -> Result<Self> {
        if mean.len() != stddev.len() || mean.is_empty() {
            return Err(PplError::InvalidParameter {
                family: Self::NAME,
                reason: format!("mean has {} entries, stddev has {}", mean.len(), stddev.len()),
            });
        }
        Ok(Self {
            mean: mean.to_vec(),
            stddev: stddev.to_vec(),
            prior: Self::components(mean, stddev)?,
            proposal: None,
        })
    }

    fn components(mean: &[f64], stddev: &[f64]) -> Result<Vec<statrs::distribution::Normal>> {
        mean.iter()
            .zip(stddev)
            .map(|(&m, &s)| statrs::distribution::Normal::new(m, s).map_err(invalid(Self::NAME)))
            .collect()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn stddev(&self) -> &[f64] {
        &self.stddev
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    fn draw(components: &[statrs::distribution::Normal], rng: &mut dyn RngCore) -> Value {
        components.iter().map(|d| d.sample(rng)).collect()
    }

    fn ln_pdf(components: &[statrs::distribution::Normal], value: &Value) -> f64 {
        if value.len() != components.len() {
            return f64::NEG_INFINITY;
        }
        components.iter().zip(value.iter()).map(|(d, &x)| d.ln_pdf(x)).sum()
    }
}

impl PriorFamily for Normal {
    const NAME: &'static str = "Normal";

    fn address_suffix(&self) -> String {
        if self.dim() == 1 {
            Self::NAME.to_string()
        } else {
            format!("{}(dim:{})", Self::NAME, self.dim())
        }
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        Self::draw(&self.prior, rng)
    }

    fn log_prob(&self, value: &Value) -> f64 {
        Self::ln_pdf(&self.prior, value)
    }

    /// Parameters are all proposal means followed by all proposal stddevs.
    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        let dim = self.dim();
        check_arity(Self::NAME, params, 2 * dim)?;
        self.proposal = Some(Self::components(&params[..dim], &params[dim..])?);
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        Self::draw(self.proposal.as_deref().unwrap_or(&self.prior), rng)
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        Self::ln_pdf(self.proposal.as_deref().unwrap_or(&self.prior), value)
    }

    fn inflated(&self) -> Self {
        let stddev: Vec<f64> = self.stddev.iter().map(|s| s * 3.0).collect();
        Self::diagonal(&self.mean, &stddev).unwrap_or_else(|_| self.clone())
    }
}

/// Continuous uniform on `[low, high)`.
#[derive(Debug, Clone)]
pub struct Uniform {
    low: f64,
    high: f64,
    prior: statrs::distribution::Uniform,
    proposal: Option<ModeCertainty>,
}

impl Uniform {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        Ok(Self {
            low,
            high,
            prior: statrs::distribution::Uniform::new(low, high).map_err(invalid(Self::NAME))?,
            proposal: None,
        })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

impl PriorFamily for Uniform {
    const NAME: &'static str = "Uniform";

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.prior.sample(rng))
    }

    fn log_prob(&self, value: &Value) -> f64 {
        scalar_ln_pdf(&self.prior, value)
    }

    /// Parameters are `[mode, certainty]`, mode in `[0, 1]` relative to the support.
    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        check_arity(Self::NAME, params, 2)?;
        self.proposal = Some(ModeCertainty::new(
            Self::NAME,
            self.low,
            self.high,
            params[0],
            params[1],
        )?);
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        match &self.proposal {
            Some(q) => scalar(q.draw(rng)),
            None => self.sample(rng),
        }
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        match (&self.proposal, as_scalar(value)) {
            (Some(q), Some(x)) => q.ln_pdf(x),
            (Some(_), None) => f64::NEG_INFINITY,
            (None, _) => self.log_prob(value),
        }
    }
}

/// Uniform over the integers `min, min + 1, ..., min + size - 1`.
#[derive(Debug, Clone)]
pub struct UniformDiscrete {
    min: i64,
    size: usize,
    prior: Weights,
    proposal: Option<Weights>,
}

impl UniformDiscrete {
    pub fn new(min: i64, size: usize) -> Result<Self> {
        Ok(Self {
            min,
            size,
            prior: Weights::uniform(Self::NAME, size)?,
            proposal: None,
        })
    }

    fn offset(&self, value: &Value) -> Option<usize> {
        let shifted = value.mapv(|x| x - self.min as f64);
        as_index(&shifted, self.size)
    }

    fn value_of(&self, k: usize) -> Value {
        scalar((self.min + k as i64) as f64)
    }
}

impl PriorFamily for UniformDiscrete {
    const NAME: &'static str = "UniformDiscrete";

    fn address_suffix(&self) -> String {
        format!("{}(min:{}, size:{})", Self::NAME, self.min, self.size)
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        self.value_of(self.prior.draw(rng))
    }

    fn log_prob(&self, value: &Value) -> f64 {
        self.prior.ln_pmf(self.offset(value))
    }

    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        check_arity(Self::NAME, params, self.size)?;
        self.proposal = Some(Weights::new(Self::NAME, params)?);
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        self.value_of(self.proposal.as_ref().unwrap_or(&self.prior).draw(rng))
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        self.proposal
            .as_ref()
            .unwrap_or(&self.prior)
            .ln_pmf(self.offset(value))
    }
}

/// Categorical over `0..probs.len()`; probabilities are normalized on construction.
#[derive(Debug, Clone)]
pub struct Categorical {
    prior: Weights,
    proposal: Option<Weights>,
}

impl Categorical {
    pub fn new(probs: &[f64]) -> Result<Self> {
        Ok(Self {
            prior: Weights::new(Self::NAME, probs)?,
            proposal: None,
        })
    }

    pub fn probs(&self) -> &[f64] {
        &self.prior.probs
    }

    pub fn size(&self) -> usize {
        self.prior.probs.len()
    }
}

impl PriorFamily for Categorical {
    const NAME: &'static str = "Categorical";

    fn address_suffix(&self) -> String {
        format!("{}(size:{})", Self::NAME, self.size())
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.prior.draw(rng) as f64)
    }

    fn log_prob(&self, value: &Value) -> f64 {
        self.prior.ln_pmf(as_index(value, self.size()))
    }

    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        check_arity(Self::NAME, params, self.size())?;
        self.proposal = Some(Weights::new(Self::NAME, params)?);
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.proposal.as_ref().unwrap_or(&self.prior).draw(rng) as f64)
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        self.proposal
            .as_ref()
            .unwrap_or(&self.prior)
            .ln_pmf(as_index(value, self.size()))
    }

    fn inflated(&self) -> Self {
        match Weights::uniform(Self::NAME, self.size()) {
            Ok(prior) => Self {
                prior,
                proposal: self.proposal.clone(),
            },
            Err(_) => self.clone(),
        }
    }
}

/// Coin flip producing `0.0` or `1.0`.
#[derive(Debug, Clone)]
pub struct Bernoulli {
    p: f64,
    prior: rand::distributions::Bernoulli,
    proposal: Option<(f64, rand::distributions::Bernoulli)>,
}

impl Bernoulli {
    pub fn new(p: f64) -> Result<Self> {
        Ok(Self {
            p,
            prior: rand::distributions::Bernoulli::new(p).map_err(invalid(Self::NAME))?,
            proposal: None,
        })
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    fn ln_pmf(p: f64, value: &Value) -> f64 {
        match as_index(value, 2) {
            Some(1) => p.ln(),
            Some(_) => (1.0 - p).ln(),
            None => f64::NEG_INFINITY,
        }
    }

    fn flip(dist: &rand::distributions::Bernoulli, rng: &mut dyn RngCore) -> Value {
        scalar(if dist.sample(rng) { 1.0 } else { 0.0 })
    }
}

impl PriorFamily for Bernoulli {
    const NAME: &'static str = "Bernoulli";

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        Self::flip(&self.prior, rng)
    }

    fn log_prob(&self, value: &Value) -> f64 {
        Self::ln_pmf(self.p, value)
    }

    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        check_arity(Self::NAME, params, 1)?;
        let q = rand::distributions::Bernoulli::new(params[0]).map_err(invalid(Self::NAME))?;
        self.proposal = Some((params[0], q));
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        match &self.proposal {
            Some((_, q)) => Self::flip(q, rng),
            None => self.sample(rng),
        }
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        Self::ln_pmf(self.proposal.as_ref().map_or(self.p, |(q, _)| *q), value)
    }
}

/// Laplace with location and scale.
#[derive(Debug, Clone)]
pub struct Laplace {
    prior: statrs::distribution::Laplace,
    proposal: Option<statrs::distribution::Laplace>,
}

impl Laplace {
    pub fn new(location: f64, scale: f64) -> Result<Self> {
        Ok(Self {
            prior: statrs::distribution::Laplace::new(location, scale)
                .map_err(invalid(Self::NAME))?,
            proposal: None,
        })
    }
}

impl PriorFamily for Laplace {
    const NAME: &'static str = "Laplace";

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.prior.sample(rng))
    }

    fn log_prob(&self, value: &Value) -> f64 {
        scalar_ln_pdf(&self.prior, value)
    }

    /// Parameters are `[location, scale]`.
    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        check_arity(Self::NAME, params, 2)?;
        self.proposal = Some(
            statrs::distribution::Laplace::new(params[0], params[1])
                .map_err(invalid(Self::NAME))?,
        );
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.proposal.as_ref().unwrap_or(&self.prior).sample(rng))
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        scalar_ln_pdf(self.proposal.as_ref().unwrap_or(&self.prior), value)
    }
}

/// Gamma with shape and rate.
#[derive(Debug, Clone)]
pub struct Gamma {
    prior: statrs::distribution::Gamma,
    proposal: Option<statrs::distribution::Gamma>,
}

impl Gamma {
    pub fn new(shape: f64, rate: f64) -> Result<Self> {
        Ok(Self {
            prior: statrs::distribution::Gamma::new(shape, rate).map_err(invalid(Self::NAME))?,
            proposal: None,
        })
    }
}

impl PriorFamily for Gamma {
    const NAME: &'static str = "Gamma";

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.prior.sample(rng))
    }

    fn log_prob(&self, value: &Value) -> f64 {
        scalar_ln_pdf(&self.prior, value)
    }

    /// Parameters are `[location, scale]`: the proposal is the gamma with that
    /// mean and standard deviation.
    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        check_arity(Self::NAME, params, 2)?;
        let (location, scale) = (params[0], params[1]);
        let shape = (location / scale).powi(2);
        let rate = location / scale.powi(2);
        self.proposal =
            Some(statrs::distribution::Gamma::new(shape, rate).map_err(invalid(Self::NAME))?);
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.proposal.as_ref().unwrap_or(&self.prior).sample(rng))
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        scalar_ln_pdf(self.proposal.as_ref().unwrap_or(&self.prior), value)
    }
}

/// Beta on `[0, 1]`.
#[derive(Debug, Clone)]
pub struct Beta {
    prior: statrs::distribution::Beta,
    proposal: Option<ModeCertainty>,
}

impl Beta {
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        Ok(Self {
            prior: statrs::distribution::Beta::new(alpha, beta).map_err(invalid(Self::NAME))?,
            proposal: None,
        })
    }
}

impl PriorFamily for Beta {
    const NAME: &'static str = "Beta";

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.prior.sample(rng))
    }

    fn log_prob(&self, value: &Value) -> f64 {
        scalar_ln_pdf(&self.prior, value)
    }

    /// Parameters are `[mode, certainty]`.
    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        check_arity(Self::NAME, params, 2)?;
        self.proposal = Some(ModeCertainty::new(Self::NAME, 0.0, 1.0, params[0], params[1])?);
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        match &self.proposal {
            Some(q) => scalar(q.draw(rng)),
            None => self.sample(rng),
        }
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        match (&self.proposal, as_scalar(value)) {
            (Some(q), Some(x)) => q.ln_pdf(x),
            (Some(_), None) => f64::NEG_INFINITY,
            (None, _) => self.log_prob(value),
        }
    }
}

/// Weibull with scale and concentration.
#[derive(Debug, Clone)]
pub struct Weibull {
    prior: statrs::distribution::Weibull,
    proposal: Option<statrs::distribution::Weibull>,
}

impl Weibull {
    pub fn new(scale: f64, concentration: f64) -> Result<Self> {
        Ok(Self {
            prior: statrs::distribution::Weibull::new(concentration, scale)
                .map_err(invalid(Self::NAME))?,
            proposal: None,
        })
    }
}

impl PriorFamily for Weibull {
    const NAME: &'static str = "Weibull";

    fn sample(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.prior.sample(rng))
    }

    fn log_prob(&self, value: &Value) -> f64 {
        scalar_ln_pdf(&self.prior, value)
    }

    /// Parameters are `[scale, concentration]`.
    fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        check_arity(Self::NAME, params, 2)?;
        self.proposal = Some(
            statrs::distribution::Weibull::new(params[1], params[0])
                .map_err(invalid(Self::NAME))?,
        );
        Ok(())
    }

    fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        scalar(self.proposal.as_ref().unwrap_or(&self.prior).sample(rng))
    }

    fn proposal_log_prob(&self, value: &Value) -> f64 {
        scalar_ln_pdf(self.proposal.as_ref().unwrap_or(&self.prior), value)
    }
}

/// The closed set of prior families the engine can record.
#[derive(Debug, Clone)]
pub enum Distribution {
    Normal(Normal),
    Uniform(Uniform),
    UniformDiscrete(UniformDiscrete),
    Categorical(Categorical),
    Bernoulli(Bernoulli),
    Laplace(Laplace),
    Gamma(Gamma),
    Beta(Beta),
    Weibull(Weibull),
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $body:expr) => {
        match $self {
            Distribution::Normal($d) => $body,
            Distribution::Uniform($d) => $body,
            Distribution::UniformDiscrete($d) => $body,
            Distribution::Categorical($d) => $body,
            Distribution::Bernoulli($d) => $body,
            Distribution::Laplace($d) => $body,
            Distribution::Gamma($d) => $body,
            Distribution::Beta($d) => $body,
            Distribution::Weibull($d) => $body,
        }
    };
}

macro_rules! family_name {
    ($self:expr, $($variant:ident),+) => {
        match $self {
            $(Distribution::$variant(_) => $variant::NAME,)+
        }
    };
}

impl Distribution {
    pub fn name(&self) -> &'static str {
        family_name!(
            self,
            Normal,
            Uniform,
            UniformDiscrete,
            Categorical,
            Bernoulli,
            Laplace,
            Gamma,
            Beta,
            Weibull
        )
    }

    pub fn address_suffix(&self) -> String {
        dispatch!(self, d => d.address_suffix())
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> Value {
        dispatch!(self, d => d.sample(rng))
    }

    pub fn log_prob(&self, value: &Value) -> f64 {
        dispatch!(self, d => d.log_prob(value))
    }

    pub fn set_proposal_params(&mut self, params: &[f64]) -> Result<()> {
        dispatch!(self, d => d.set_proposal_params(params))
    }

    pub fn has_proposal(&self) -> bool {
        dispatch!(self, d => d.has_proposal())
    }

    pub fn sample_proposal(&self, rng: &mut dyn RngCore) -> Value {
        dispatch!(self, d => d.sample_proposal(rng))
    }

    pub fn proposal_log_prob(&self, value: &Value) -> f64 {
        dispatch!(self, d => d.proposal_log_prob(value))
    }

    pub fn inflated(&self) -> Self {
        match self {
            Distribution::Normal(d) => Distribution::Normal(d.inflated()),
            Distribution::Categorical(d) => Distribution::Categorical(d.inflated()),
            other => other.clone(),
        }
    }

    /// Dimension of values drawn from this distribution.
    pub fn value_dim(&self) -> usize {
        match self {
            Distribution::Normal(d) => d.dim(),
            _ => 1,
        }
    }

    /// Whether `value` can have been produced by this distribution.
    pub fn supports(&self, value: &Value) -> bool {
        value.len() == self.value_dim() && self.log_prob(value) > f64::NEG_INFINITY
    }

    /// Local proposal kernel centred on `center`, for random-walk MH.
    ///
    /// Normal sites move with a Gaussian of the prior's stddev; uniform sites
    /// with a Gaussian of a tenth of the support width truncated to it. Other
    /// families have no kernel and are redrawn from the prior, as is a
    /// `center` outside the current support.
    pub fn random_walk_kernel(&self, center: &Value) -> Option<Kernel> {
        if !self.supports(center) {
            return None;
        }
        match self {
            Distribution::Normal(d) if center.len() == d.dim() => {
                Normal::diagonal(center.as_slice()?, d.stddev()).ok().map(Kernel::Gaussian)
            }
            Distribution::Uniform(d) => {
                let mean = as_scalar(center)?;
                let sd = 0.1 * (d.high() - d.low());
                let normal = statrs::distribution::Normal::new(mean, sd).ok()?;
                Some(Kernel::Truncated {
                    normal,
                    low: d.low(),
                    high: d.high(),
                })
            }
            _ => None,
        }
    }
}

macro_rules! impl_from_family {
    ($($variant:ident),+) => {
        $(
            impl From<$variant> for Distribution {
                fn from(d: $variant) -> Self {
                    Distribution::$variant(d)
                }
            }
        )+
    };
}

impl_from_family!(
    Normal,
    Uniform,
    UniformDiscrete,
    Categorical,
    Bernoulli,
    Laplace,
    Gamma,
    Beta,
    Weibull
);

/// Random-walk proposal kernel used at the resampled MH site.
#[derive(Debug, Clone)]
pub enum Kernel {
    Gaussian(Normal),
    Truncated {
        normal: statrs::distribution::Normal,
        low: f64,
        high: f64,
    },
}

impl Kernel {
    pub fn sample(&self, rng: &mut dyn RngCore) -> Value {
        match self {
            Kernel::Gaussian(d) => d.sample(rng),
            // Inverse-CDF draw restricted to [low, high].
            Kernel::Truncated { normal, low, high } => {
                let (lo, hi) = (normal.cdf(*low), normal.cdf(*high));
                let u = lo + (hi - lo) * rng.gen::<f64>();
                scalar(normal.inverse_cdf(u).clamp(*low, *high))
            }
        }
    }

    pub fn log_prob(&self, value: &Value) -> f64 {
        match self {
            Kernel::Gaussian(d) => d.log_prob(value),
            Kernel::Truncated { normal, low, high } => match as_scalar(value) {
                Some(x) if (*low..=*high).contains(&x) => {
                    normal.ln_pdf(x) - (normal.cdf(*high) - normal.cdf(*low)).ln()
                }
                _ => f64::NEG_INFINITY,
            },
        }
    }
}
