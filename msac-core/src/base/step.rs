//! Environment step.
use super::Env;

/// Additional information to `Obs` and `Act`.
pub trait Info {}

impl Info for () {}

/// Represents an action, observation and reward tuple `(a_t, o_t+1, r_t)`
/// with some additional information.
///
/// An environment emits a [`Step`] object at every interaction step.
/// This object is used to create transitions `(o_t, a_t, o_t+1, r_t)`.
pub struct Step<E: Env> {
    /// Action.
    pub act: E::Act,

    /// Observation.
    pub obs: E::Obs,

    /// Reward.
    pub reward: Vec<f32>,

    /// Flag denoting if the episode is done.
    pub is_done: Vec<i8>,

    /// Information defined by the user.
    pub info: E::Info,

    /// Initial observation of the next episode. Only used when `is_done[0] == 1`.
    pub init_obs: E::Obs,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(
        obs: E::Obs,
        act: E::Act,
        reward: Vec<f32>,
        is_done: Vec<i8>,
        info: E::Info,
        init_obs: E::Obs,
    ) -> Self {
        Step {
            act,
            obs,
            reward,
            is_done,
            info,
            init_obs,
        }
    }

    /// Returns `true` if the episode ends with this step.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.is_done[0] == 1
    }
}

/// Processes a [`Step`] and outputs an item [`Self::Output`].
///
/// [`Step`] objects are transformed to [`Self::Output`], which will be pushed
/// into a replay buffer implementing
/// [`ExperienceBufferBase`](crate::ExperienceBufferBase).
/// The type [`Self::Output`] should be the same as
/// [`ExperienceBufferBase::Item`](crate::ExperienceBufferBase::Item).
///
/// [`Self::Output`]: StepProcessor::Output
pub trait StepProcessor<E: Env> {
    /// Configuration.
    type Config: Clone;

    /// The type of transitions produced by this trait.
    type Output;

    /// Builds a processor.
    fn build(config: &Self::Config) -> Self;

    /// Resets the object.
    fn reset(&mut self, init_obs: E::Obs);

    /// Processes a [`Step`] object.
    fn process(&mut self, step: Step<E>) -> Self::Output;
}
