//! Default implementation of the [`Evaluator`] trait.
use super::Evaluator;
use crate::{Env, Policy};
use anyhow::Result;

/// Runs a fixed number of episodes and averages the episode returns.
pub struct DefaultEvaluator<E: Env> {
    /// The number of episodes to run during evaluation.
    n_episodes: usize,

    /// The environment instance used for evaluation.
    env: E,
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<f32> {
        let mut r_total = 0f32;

        for ix in 0..self.n_episodes {
            let mut prev_obs = self.env.reset_with_index(ix)?;

            loop {
                let act = policy.sample(&prev_obs);
                let (step, _) = self.env.step(&act);
                r_total += step.reward[0];
                if step.is_done() {
                    break;
                }
                prev_obs = step.obs;
            }
        }

        Ok(r_total / self.n_episodes as f32)
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs a [`DefaultEvaluator`].
    ///
    /// `seed` is given to the environment at build time; each episode is
    /// reset with its index.
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize) -> Result<Self> {
        Ok(Self {
            n_episodes,
            env: E::build(config, seed)?,
        })
    }
}
