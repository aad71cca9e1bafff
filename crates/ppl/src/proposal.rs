use ndarray::Array1;

use crate::address::SuffixedAddress;
use crate::config::ObserveMap;
use crate::distributions::Distribution;
use crate::error::Result;
use crate::trace::Sample;

/// Source of learned proposal parameters, e.g. an amortized inference network.
///
/// The engine hands it the samples recorded so far, the observation
/// embedding and the site being sampled; the returned parameters are passed
/// unchanged to `Distribution::set_proposal_params`.
pub trait ProposalSource {
    /// Embed the observed values once per trace. `None` means the source does
    /// not condition on an embedding.
    fn embed_observations(&mut self, _observes: &ObserveMap) -> Option<Array1<f64>> {
        None
    }

    fn propose(
        &mut self,
        trace_so_far: &[Sample],
        embedding: Option<&Array1<f64>>,
        address: &SuffixedAddress,
        distribution: &Distribution,
    ) -> Result<Vec<f64>>;
}

impl<F> ProposalSource for F
where
    F: FnMut(&[Sample], Option<&Array1<f64>>, &SuffixedAddress, &Distribution) -> Result<Vec<f64>>,
{
    fn propose(
        &mut self,
        trace_so_far: &[Sample],
        embedding: Option<&Array1<f64>>,
        address: &SuffixedAddress,
        distribution: &Distribution,
    ) -> Result<Vec<f64>> {
        self(trace_so_far, embedding, address, distribution)
    }
}
