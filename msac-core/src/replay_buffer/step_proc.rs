//! Generic implementation of step processing.
use super::{BatchBase, GenericTransitionBatch};
use crate::{Env, Obs, Step, StepProcessor};
use std::{default::Default, marker::PhantomData};

/// Configuration of [`SimpleStepProcessor`].
#[derive(Clone, Debug, Default)]
pub struct SimpleStepProcessorConfig {}

/// A [`StepProcessor`] creating 1-step transitions.
///
/// The processor keeps the previous observation `o_t` and combines it with an
/// incoming [`Step`] into the transition `(o_t, a_t, o_t+1, r_t, is_done_t)`.
pub struct SimpleStepProcessor<E, O, A> {
    prev_obs: Option<O>,
    phantom: PhantomData<(E, A)>,
}

impl<E, O, A> StepProcessor<E> for SimpleStepProcessor<E, O, A>
where
    E: Env,
    O: BatchBase + From<E::Obs>,
    A: BatchBase + From<E::Act>,
{
    type Config = SimpleStepProcessorConfig;
    type Output = GenericTransitionBatch<O, A>;

    fn build(_config: &Self::Config) -> Self {
        Self {
            prev_obs: None,
            phantom: PhantomData,
        }
    }

    fn reset(&mut self, init_obs: E::Obs) {
        self.prev_obs = Some(init_obs.into());
    }

    fn process(&mut self, step: Step<E>) -> Self::Output {
        debug_assert_eq!(step.obs.len(), 1);

        let obs = self
            .prev_obs
            .replace(step.obs.clone().into())
            .expect("prev_obs is not set. Forgot to call reset()?");
        let act = step.act.into();
        let next_obs = step.obs.into();

        GenericTransitionBatch {
            obs,
            act,
            next_obs,
            reward: step.reward,
            is_done: step.is_done,
        }
    }
}
