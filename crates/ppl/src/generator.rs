use tracing::trace;

use crate::context::{ExecutionContext, TraceSettings};
use crate::error::Result;
use crate::model::Model;
use crate::trace::Trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Idle,
    Running,
}

/// Runs a model under fixed `TraceSettings`, one execution per trace.
///
/// As an `Iterator` it yields an unbounded sequence of independent traces.
/// `generate` additionally accepts the current MH state as a reuse source.
pub struct TraceGenerator<M: Model> {
    model: M,
    ctx: ExecutionContext,
    settings: TraceSettings,
    state: GeneratorState,
    generated: usize,
}

impl<M: Model> TraceGenerator<M> {
    pub fn new(model: M, ctx: ExecutionContext, settings: TraceSettings) -> Self {
        Self {
            model,
            ctx,
            settings,
            state: GeneratorState::Idle,
            generated: 0,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Number of traces completed so far.
    pub fn generated(&self) -> usize {
        self.generated
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.ctx
    }

    pub fn into_context(self) -> ExecutionContext {
        self.ctx
    }

    /// Execute the model once.
    ///
    /// A model error discards the partially recorded trace before it is
    /// returned, leaving the context ready for the next execution.
    pub fn generate(&mut self, current: Option<&Trace<M::Output>>) -> Result<Trace<M::Output>> {
        self.ctx.begin_trace(self.settings.clone(), current)?;
        self.state = GeneratorState::Running;

        let result = self.model.forward(&mut self.ctx);
        self.state = GeneratorState::Idle;

        match result {
            Ok(output) => {
                let trace = self.ctx.end_trace(output)?;
                self.generated += 1;
                trace!(
                    model = self.model.name(),
                    index = self.generated,
                    length = trace.length,
                    log_prob = trace.log_prob,
                    "trace generated"
                );
                Ok(trace)
            }
            Err(err) => {
                self.ctx.abort_trace();
                Err(err)
            }
        }
    }
}

impl<M: Model> Iterator for TraceGenerator<M> {
    type Item = Result<Trace<M::Output>>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generate(None))
    }
}
