//! A uniform-sampling replay buffer.
use super::{BatchBase, GenericTransitionBatch, SimpleReplayBufferConfig};
use crate::{
    error::CoreError, ExperienceBufferBase, ReplayBufferBase, TransitionBatch,
};
use anyhow::Result;
use rand::{rngs::StdRng, RngCore, SeedableRng};

/// A ring buffer of transitions with uniform random sampling.
///
/// Transitions are stored up to a fixed capacity, after which the oldest
/// entries are overwritten. Minibatches are sampled i.i.d. with replacement.
pub struct SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    capacity: usize,

    /// Current insertion index.
    i: usize,

    /// Current number of stored transitions.
    size: usize,

    obs: O,
    act: A,
    next_obs: O,
    reward: Vec<f32>,
    is_done: Vec<i8>,

    rng: StdRng,
}

impl<O, A> SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    #[inline]
    fn push_reward(&mut self, i: usize, b: &Vec<f32>) {
        let mut j = i;
        for r in b.iter() {
            self.reward[j] = *r;
            j += 1;
            if j == self.capacity {
                j = 0;
            }
        }
    }

    #[inline]
    fn push_is_done(&mut self, i: usize, b: &Vec<i8>) {
        let mut j = i;
        for d in b.iter() {
            self.is_done[j] = *d;
            j += 1;
            if j == self.capacity {
                j = 0;
            }
        }
    }

    fn sample_reward(&self, ixs: &Vec<usize>) -> Vec<f32> {
        ixs.iter().map(|ix| self.reward[*ix]).collect()
    }

    fn sample_is_done(&self, ixs: &Vec<usize>) -> Vec<i8> {
        ixs.iter().map(|ix| self.is_done[*ix]).collect()
    }

    /// Returns the number of done flags in the buffer.
    pub fn num_done_flags(&self) -> usize {
        self.is_done.iter().map(|is_done| *is_done as usize).sum()
    }

    /// Returns the sum of all rewards in the buffer.
    pub fn sum_rewards(&self) -> f32 {
        self.reward.iter().sum()
    }
}

impl<O, A> ExperienceBufferBase for SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Item = GenericTransitionBatch<O, A>;

    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        let len = tr.len(); // batch size
        let (obs, act, next_obs, reward, is_done) = tr.unpack();
        self.obs.push(self.i, obs);
        self.act.push(self.i, act);
        self.next_obs.push(self.i, next_obs);
        self.push_reward(self.i, &reward);
        self.push_is_done(self.i, &is_done);

        self.i = (self.i + len) % self.capacity;
        self.size += len;
        if self.size >= self.capacity {
            self.size = self.capacity;
        }

        Ok(())
    }
}

impl<O, A> ReplayBufferBase for SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Config = SimpleReplayBufferConfig;
    type Batch = GenericTransitionBatch<O, A>;

    fn build(config: &Self::Config) -> Self {
        let capacity = config.capacity;

        Self {
            capacity,
            i: 0,
            size: 0,
            obs: O::new(capacity),
            act: A::new(capacity),
            next_obs: O::new(capacity),
            reward: vec![0.; capacity],
            is_done: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        if self.size == 0 {
            return Err(CoreError::NotEnoughTransitions(self.size, size).into());
        }

        let ixs = (0..size)
            .map(|_| (self.rng.next_u32() as usize) % self.size)
            .collect::<Vec<_>>();

        Ok(Self::Batch {
            obs: self.obs.sample(&ixs),
            act: self.act.sample(&ixs),
            next_obs: self.next_obs.sample(&ixs),
            reward: self.sample_reward(&ixs),
            is_done: self.sample_is_done(&ixs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Observation/action batch backed by a plain vector, for tests.
    #[derive(Clone, Debug)]
    struct VecBatch(Vec<f32>);

    impl BatchBase for VecBatch {
        fn new(capacity: usize) -> Self {
            Self(vec![0.; capacity])
        }

        fn push(&mut self, ix: usize, data: Self) {
            let capacity = self.0.len();
            for (j, v) in data.0.iter().enumerate() {
                self.0[(ix + j) % capacity] = *v;
            }
        }

        fn sample(&self, ixs: &Vec<usize>) -> Self {
            Self(ixs.iter().map(|ix| self.0[*ix]).collect())
        }
    }

    fn transition(v: f32, is_done: i8) -> GenericTransitionBatch<VecBatch, VecBatch> {
        GenericTransitionBatch {
            obs: VecBatch(vec![v]),
            act: VecBatch(vec![v + 0.5]),
            next_obs: VecBatch(vec![v + 1.0]),
            reward: vec![v],
            is_done: vec![is_done],
        }
    }

    #[test]
    fn test_push_and_len() {
        let config = SimpleReplayBufferConfig::default().capacity(4);
        let mut buffer = SimpleReplayBuffer::<VecBatch, VecBatch>::build(&config);

        for i in 0..6 {
            buffer.push(transition(i as f32, 0)).unwrap();
        }

        // the ring buffer saturates at its capacity
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_reward_and_done_summaries() {
        let config = SimpleReplayBufferConfig::default().capacity(8);
        let mut buffer = SimpleReplayBuffer::<VecBatch, VecBatch>::build(&config);

        for i in 0..4 {
            buffer.push(transition(i as f32, (i % 2) as i8)).unwrap();
        }

        assert_eq!(buffer.num_done_flags(), 2);
        assert_eq!(buffer.sum_rewards(), 6.0);
    }

    #[test]
    fn test_batch_fields_are_consistent() {
        let config = SimpleReplayBufferConfig::default().capacity(8).seed(0);
        let mut buffer = SimpleReplayBuffer::<VecBatch, VecBatch>::build(&config);

        for i in 0..8 {
            buffer.push(transition(i as f32, (i % 2) as i8)).unwrap();
        }

        let batch = buffer.batch(16).unwrap();
        assert_eq!(batch.len(), 16);

        // each sampled transition keeps its obs/act/reward alignment
        for i in 0..16 {
            let v = batch.reward[i];
            assert_eq!(batch.obs.0[i], v);
            assert_eq!(batch.act.0[i], v + 0.5);
            assert_eq!(batch.next_obs.0[i], v + 1.0);
        }
    }

    #[test]
    fn test_batch_from_empty_buffer_fails() {
        let config = SimpleReplayBufferConfig::default();
        let mut buffer = SimpleReplayBuffer::<VecBatch, VecBatch>::build(&config);
        assert!(buffer.batch(4).is_err());
    }
}
