use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::config::PriorInflation;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::inference::prior_traces;
use crate::model::Model;
use crate::utils::mean_and_variance;

/// Summary of a model's trace structure under the prior.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStatistics {
    pub model: String,
    pub num_traces: usize,
    /// Whether lengths count controlled samples only.
    pub controlled_only: bool,
    pub trace_length_mean: f64,
    pub trace_length_stddev: f64,
    pub trace_length_min: usize,
    pub trace_length_max: usize,
    pub log_prob_mean: f64,
    pub distinct_addresses: usize,
}

/// Run the model `num_traces` times from the prior and summarize trace
/// lengths and addresses.
pub fn prior_statistics<M: Model>(
    model: M,
    ctx: ExecutionContext,
    num_traces: usize,
    controlled_only: bool,
) -> Result<TraceStatistics> {
    let name = model.name().to_string();
    let traces = prior_traces(model, ctx, num_traces, PriorInflation::Disabled)?;

    let lengths: Vec<usize> = traces
        .values()
        .iter()
        .map(|t| if controlled_only { t.length_controlled } else { t.length })
        .collect();
    let as_f64: Vec<f64> = lengths.iter().map(|&l| l as f64).collect();
    let (mean, variance) = mean_and_variance(&as_f64);
    let log_probs: Vec<f64> = traces.values().iter().map(|t| t.log_prob).collect();
    let (log_prob_mean, _) = mean_and_variance(&log_probs);

    let addresses: BTreeSet<_> = traces
        .values()
        .iter()
        .flat_map(|t| t.samples.iter())
        .filter(|s| !controlled_only || s.controlled)
        .map(|s| s.address.clone())
        .collect();

    let stats = TraceStatistics {
        model: name,
        num_traces,
        controlled_only,
        trace_length_mean: mean,
        trace_length_stddev: variance.sqrt(),
        trace_length_min: lengths.iter().copied().min().unwrap_or(0),
        trace_length_max: lengths.iter().copied().max().unwrap_or(0),
        log_prob_mean,
        distinct_addresses: addresses.len(),
    };
    debug!(?stats, "prior statistics");
    Ok(stats)
}
