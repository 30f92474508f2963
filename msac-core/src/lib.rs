#![warn(missing_docs)]
//! Backend-agnostic abstractions for reinforcement learning.
//!
//! This crate provides the pieces shared by the M-SAC agent and the
//! experiment runners: traits for environments, policies and agents,
//! a uniform-sampling replay buffer, a record-based observability layer
//! and a training loop.
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Act, Agent, Configurable, Env, ExperienceBufferBase, Info, Obs, Policy, ReplayBufferBase,
    Step, StepProcessor, TransitionBatch,
};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod trainer;
pub use trainer::{Sampler, Trainer, TrainerConfig};
