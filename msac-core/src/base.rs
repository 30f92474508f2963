//! Core functionalities.
mod agent;
mod batch;
mod env;
mod policy;
mod replay_buffer;
mod step;
pub use agent::Agent;
pub use batch::TransitionBatch;
pub use env::Env;
pub use policy::{Configurable, Policy};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
use std::fmt::Debug;
pub use step::{Info, Step, StepProcessor};

/// A set of observations of an environment.
///
/// The current version of the library does not support vectorized
/// environments, thus [`Obs::len()`] always returns 1 in practice.
pub trait Obs: Clone + Debug {
    /// Returns the number of observations in the object.
    fn len(&self) -> usize;
}

/// A set of actions of an environment.
pub trait Act: Clone + Debug {
    /// Returns the number of actions in the object.
    fn len(&self) -> usize;
}
