//! Evaluate trained policies.
use crate::{Env, Policy};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluates a [`Policy`].
pub trait Evaluator<E: Env> {
    /// Evaluates the policy and returns the average episode return.
    ///
    /// The caller of this method needs to handle the internal state of the
    /// policy, like training/evaluation mode.
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<f32>;
}
