use thiserror::Error;

use crate::address::SuffixedAddress;

/// Errors raised while generating traces or running inference.
#[derive(Debug, Error)]
pub enum PplError {
    /// `sample`/`observe` was called while no trace was open.
    #[error("no active trace: sample/observe called outside of a trace generator")]
    NoActiveTrace,

    /// `begin_trace` was called while another trace was still open.
    #[error("a trace is already open on this execution context")]
    TraceAlreadyOpen,

    #[error("value already present at address {0}")]
    DuplicateAddress(SuffixedAddress),

    #[error("invalid {family} parameters: {reason}")]
    InvalidParameter { family: &'static str, reason: String },

    #[error("{family} expects {expected} proposal parameters, got {got}")]
    InvalidProposalParams {
        family: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("inference engine {0} requires a proposal source, but none was supplied")]
    MissingProposalSource(String),

    #[error("cannot start Metropolis-Hastings: the initial trace has no controlled samples")]
    NothingToResample,

    /// Every weight of an empirical distribution is zero or non-finite.
    #[error("cannot resample: all weights are zero or non-finite")]
    DegenerateWeights,

    #[error("configuration error: {0}")]
    Config(String),

    /// Failure raised by user model code.
    #[error("model error: {0}")]
    Model(String),
}

impl From<serde_json::Error> for PplError {
    fn from(err: serde_json::Error) -> Self {
        PplError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PplError>;
