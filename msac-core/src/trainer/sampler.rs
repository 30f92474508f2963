//! Experience sampling.
use crate::{record::Record, Env, ExperienceBufferBase, Policy, StepProcessor};
use anyhow::Result;

/// Samples transitions from the environment and pushes them to a buffer.
pub struct Sampler<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    env: E,

    /// Previous observation from the environment.
    prev_obs: Option<E::Obs>,

    /// Processor for converting steps into transitions.
    step_processor: P,
}

impl<E, P> Sampler<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    /// Creates a sampler with the given environment and step processor.
    pub fn new(env: E, step_processor: P) -> Self {
        Self {
            env,
            prev_obs: None,
            step_processor,
        }
    }

    /// Samples a transition and pushes it to the replay buffer.
    ///
    /// The method resets the environment if needed, samples an action from
    /// the policy, applies it to the environment and stores the processed
    /// transition in the buffer.
    pub fn sample_and_push<A, R>(&mut self, policy: &mut A, buffer: &mut R) -> Result<Record>
    where
        A: Policy<E>,
        R: ExperienceBufferBase<Item = P::Output>,
    {
        // Reset the environment if required
        if self.prev_obs.is_none() {
            self.prev_obs = Some(self.env.reset(None)?);
            self.step_processor
                .reset(self.prev_obs.as_ref().unwrap().clone());
        }

        // Sample an action and apply it to the environment
        let (step, record, is_done) = {
            let act = policy.sample(self.prev_obs.as_ref().unwrap());
            let (step, record) = self.env.step_with_reset(&act);
            let is_done = step.is_done();
            (step, record, is_done)
        };

        // Update the previous observation
        self.prev_obs = match is_done {
            true => Some(step.init_obs.clone()),
            false => Some(step.obs.clone()),
        };

        // Produce and push the transition
        let transition = self.step_processor.process(step);
        buffer.push(transition)?;

        // Reset the step processor at the start of a new episode
        if is_done {
            self.step_processor
                .reset(self.prev_obs.as_ref().unwrap().clone());
        }

        Ok(record)
    }
}
