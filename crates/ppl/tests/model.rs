use std::collections::HashSet;

use tracing_subscriber::EnvFilter;

use traceppl::distributions::{Normal, Uniform, UniformDiscrete};
use traceppl::utils::compute_mean_and_variance;
use traceppl::{
    model_fn, prior_statistics, prior_traces, scalar, Distribution, ExecutionContext,
    ImportanceSampler, InferenceEngine, Model, PplError, PriorInflation, Result, TraceGenerator,
    TraceSettings,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Standard normal draw by Marsaglia's polar method: the number of uniform
/// pairs drawn varies from run to run.
fn marsaglia(ctx: &mut ExecutionContext) -> Result<f64> {
    let uniform: Distribution = Uniform::new(-1.0, 1.0)?.into();
    loop {
        let x = ctx.sample(&uniform, None)?[0];
        let y = ctx.sample(&uniform, None)?[0];
        let s = x * x + y * y;
        if s > 0.0 && s < 1.0 {
            return Ok(x * (-2.0 * s.ln() / s).sqrt());
        }
    }
}

fn marsaglia_model() -> impl Model<Output = f64> {
    model_fn("gaussian_with_unknown_mean_marsaglia", |ctx: &mut ExecutionContext| {
        let mu = 1.0 + 5f64.sqrt() * marsaglia(ctx)?;
        let likelihood: Distribution = Normal::new(mu, 2f64.sqrt())?.into();
        ctx.observe(&likelihood, None, Some("obs0"))?;
        ctx.observe(&likelihood, None, Some("obs1"))?;
        Ok(mu)
    })
}

/// Geometric number of normal draws.
fn geometric_model() -> impl Model<Output = usize> {
    model_fn("geometric", |ctx: &mut ExecutionContext| {
        let stop: Distribution = Uniform::new(0.0, 1.0)?.into();
        let step: Distribution = Normal::new(0.0, 1.0)?.into();
        let mut n: usize = 0;
        while ctx.sample(&stop, Some("stop"))?[0] > 0.4 {
            ctx.sample(&step, Some("step"))?;
            n += 1;
        }
        Ok(n)
    })
}

#[test]
fn test_prior_traces_have_no_importance_weight() {
    init_tracing();
    let traces = prior_traces(
        marsaglia_model(),
        ExecutionContext::seed_from_u64(42),
        200,
        PriorInflation::Disabled,
    )
    .unwrap();

    assert!(!traces.is_weighted());
    for t in traces.values() {
        assert!(t.log_importance_weight.is_none());
        assert_eq!(t.length, t.samples.len());
        assert!(t.length_controlled <= t.length);
        assert_eq!(t.observes.len(), 2);
    }
}

#[test]
fn test_suffixed_addresses_are_unique() {
    let generator = TraceGenerator::new(
        geometric_model(),
        ExecutionContext::seed_from_u64(42),
        TraceSettings::prior(),
    );
    let mut longest = 0;
    for trace in generator.take(300) {
        let trace = trace.unwrap();
        let unique: HashSet<_> = trace.samples.iter().map(|s| &s.address_suffixed).collect();
        assert_eq!(unique.len(), trace.length, "duplicate address in {}", trace.addresses_suffixed());
        assert_eq!(trace.length, 2 * trace.get_result().copied().unwrap() + 1);
        longest = longest.max(trace.length);
    }
    assert!(longest > 5, "expected some long traces, got max length {}", longest);
}

#[test]
fn test_uniform_discrete_prior_frequencies() {
    let model = model_fn("categorical", |ctx: &mut ExecutionContext| {
        let d: Distribution = UniformDiscrete::new(0, 3)?.into();
        Ok(ctx.sample(&d, None)?[0] as usize)
    });
    let traces = prior_traces(
        model,
        ExecutionContext::seed_from_u64(42),
        3000,
        PriorInflation::Disabled,
    )
    .unwrap();
    let results = traces.results();

    for k in 0..3 {
        let freq = results.expectation(|&v| if v == k { 1.0 } else { 0.0 });
        assert!(
            (freq - 1.0 / 3.0).abs() < 0.03,
            "frequency of {} is {}, expected about 1/3",
            k,
            freq
        );
    }
}

#[test]
fn test_rejection_loop_minimum_length() {
    let stats = prior_statistics(
        marsaglia_model(),
        ExecutionContext::seed_from_u64(42),
        2000,
        false,
    )
    .unwrap();

    assert_eq!(stats.trace_length_min, 2);
    assert_eq!(stats.trace_length_min % 2, 0);
    assert!(stats.trace_length_max > 2);
    assert!(stats.trace_length_mean > 2.0 && stats.trace_length_mean < 3.5);
    // One address per uniform call site.
    assert_eq!(stats.distinct_addresses, 2);
}

#[test]
fn test_prior_mean_and_variance() {
    let model = model_fn("mu", |ctx: &mut ExecutionContext| {
        let d: Distribution = Normal::new(1.0, 2.0)?.into();
        let mu = ctx.sample_with(&d, traceppl::SampleOptions::new().name("mu"))?;
        Ok(mu[0])
    });
    let traces = prior_traces(
        model,
        ExecutionContext::seed_from_u64(42),
        5000,
        PriorInflation::Disabled,
    )
    .unwrap();

    let (mean, variance) = compute_mean_and_variance(traces.values(), "mu");
    assert!((mean - 1.0).abs() < 0.1, "prior mean {} is not close to 1", mean);
    assert!((variance - 4.0).abs() < 0.4, "prior variance {} is not close to 4", variance);
}

#[test]
fn test_prior_inflation_widens_normal() {
    let model = model_fn("wide", |ctx: &mut ExecutionContext| {
        let d: Distribution = Normal::new(0.0, 1.0)?.into();
        Ok(ctx.sample(&d, None)?[0])
    });
    let traces = prior_traces(
        &model,
        ExecutionContext::seed_from_u64(42),
        3000,
        PriorInflation::Enabled,
    )
    .unwrap();
    let (_, variance) = traces.results().mean_and_variance(|x| *x);
    assert!(variance > 6.0, "inflated variance {} should be near 9", variance);

    let s = &traces.values()[0].samples[0];
    assert_ne!(s.log_prob, s.log_prior, "log_prob should be scored under the inflated prior");
}

#[test]
fn test_fixed_seed_is_deterministic() {
    let run = |seed| {
        let mut sampler = ImportanceSampler::new(
            marsaglia_model(),
            ExecutionContext::seed_from_u64(seed),
            TraceSettings::posterior(InferenceEngine::ImportanceSampling),
        )
        .unwrap();
        sampler.run(100).unwrap()
    };
    let a = run(7);
    let b = run(7);

    assert_eq!(a.log_weights(), b.log_weights());
    for (x, y) in a.values().iter().zip(b.values()) {
        assert_eq!(x.addresses_suffixed(), y.addresses_suffixed());
        let xs: Vec<u64> = x.samples.iter().map(|s| s.value[0].to_bits()).collect();
        let ys: Vec<u64> = y.samples.iter().map(|s| s.value[0].to_bits()).collect();
        assert_eq!(xs, ys);
        assert_eq!(x.get_result(), y.get_result());
    }

    let c = run(8);
    assert_ne!(a.log_weights(), c.log_weights());
}

#[test]
fn test_sample_outside_generator_is_fatal() {
    let model = marsaglia_model();
    let mut ctx = ExecutionContext::seed_from_u64(0);
    assert!(matches!(model.forward(&mut ctx), Err(PplError::NoActiveTrace)));

    let d: Distribution = Normal::new(0.0, 1.0).unwrap().into();
    assert!(matches!(
        ctx.observe(&d, Some(&scalar(0.0)), None),
        Err(PplError::NoActiveTrace)
    ));
}
