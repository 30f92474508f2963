//! Generic implementation of transition batches.
use crate::TransitionBatch;

/// A trait defining basic batch operations.
///
/// Types implementing this trait represent batches of observations or
/// actions, both inside the replay buffer and in sampled minibatches.
pub trait BatchBase {
    /// Creates a new batch with the specified capacity.
    fn new(capacity: usize) -> Self;

    /// Adds data at the specified index.
    fn push(&mut self, ix: usize, data: Self);

    /// Retrieves samples from the specified indices.
    fn sample(&self, ixs: &Vec<usize>) -> Self;
}

/// A generic transition batch `(o_t, a_t, o_t+1, r_t, is_done_t)`.
pub struct GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    /// Current observations.
    pub obs: O,

    /// Selected actions.
    pub act: A,

    /// Next observations.
    pub next_obs: O,

    /// Transition rewards.
    pub reward: Vec<f32>,

    /// Episode done flags.
    pub is_done: Vec<i8>,
}

impl<O, A> TransitionBatch for GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type ObsBatch = O;
    type ActBatch = A;

    fn unpack(
        self,
    ) -> (
        Self::ObsBatch,
        Self::ActBatch,
        Self::ObsBatch,
        Vec<f32>,
        Vec<i8>,
    ) {
        (self.obs, self.act, self.next_obs, self.reward, self.is_done)
    }

    fn len(&self) -> usize {
        self.reward.len()
    }

    fn obs(&self) -> &Self::ObsBatch {
        &self.obs
    }

    fn act(&self) -> &Self::ActBatch {
        &self.act
    }
}
