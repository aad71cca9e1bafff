use std::fmt::Debug;

use crate::context::ExecutionContext;
use crate::error::Result;

/// A stochastic program whose random choices are routed through an
/// [`ExecutionContext`].
///
/// `forward` must perform every `sample` and `observe` on the context it is
/// given. Any ordinary control flow is allowed, including loops whose trip
/// count depends on earlier draws.
pub trait Model {
    type Output: Clone + Debug;

    fn name(&self) -> &str;

    fn forward(&self, ctx: &mut ExecutionContext) -> Result<Self::Output>;
}

/// A [`Model`] backed by a closure.
pub struct FnModel<F> {
    name: String,
    forward: F,
}

impl<F, R> Model for FnModel<F>
where
    F: Fn(&mut ExecutionContext) -> Result<R>,
    R: Clone + Debug,
{
    type Output = R;

    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, ctx: &mut ExecutionContext) -> Result<R> {
        (self.forward)(ctx)
    }
}

/// Wrap a closure as a named model.
///
/// ```rust,ignore
/// let model = model_fn("gaussian_unknown_mean", |ctx| {
///     let mu = ctx.sample(&Normal::new(1.0, 5f64.sqrt())?.into(), Some("mu"))?;
///     ctx.observe(&Normal::new(mu[0], 2f64.sqrt())?.into(), None, Some("obs0"))?;
///     Ok(mu[0])
/// });
/// ```
pub fn model_fn<F, R>(name: &str, forward: F) -> FnModel<F>
where
    F: Fn(&mut ExecutionContext) -> Result<R>,
    R: Clone + Debug,
{
    FnModel {
        name: name.to_string(),
        forward,
    }
}

impl<M: Model + ?Sized> Model for &M {
    type Output = M::Output;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn forward(&self, ctx: &mut ExecutionContext) -> Result<Self::Output> {
        (**self).forward(ctx)
    }
}
