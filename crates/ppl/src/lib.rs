pub mod address;
pub mod analytics;
pub mod config;
pub mod context;
pub mod distributions;
pub mod empirical;
pub mod error;
pub mod generator;
pub mod inference;
pub mod model;
pub mod proposal;
pub mod trace;
pub mod utils;

pub use address::{Address, AddressCounter, Site, SuffixedAddress};
pub use analytics::{prior_statistics, TraceStatistics};
pub use config::{InferenceConfig, InferenceEngine, ObserveMap, PriorInflation, TraceMode};
pub use context::{ExecutionContext, SampleOptions, TraceSettings};
pub use distributions::{scalar, Distribution, PriorFamily, Value};
pub use empirical::Empirical;
pub use error::{PplError, Result};
pub use generator::TraceGenerator;
pub use inference::{
    log_acceptance_ratio, posterior_traces, prior_traces, ChainStats, ImportanceSampler,
    LightweightMH,
};
pub use model::{model_fn, FnModel, Model};
pub use proposal::ProposalSource;
pub use trace::{Observation, Sample, Trace};
