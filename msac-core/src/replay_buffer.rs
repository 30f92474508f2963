//! Generic implementation of replay buffers.
//!
//! [`SimpleReplayBuffer`] stores transitions of arbitrary observation and
//! action types and samples minibatches uniformly at random, as required by
//! the M-SAC update loop. Prioritized replay is not supported.
mod base;
mod batch;
mod config;
mod step_proc;
pub use base::SimpleReplayBuffer;
pub use batch::{BatchBase, GenericTransitionBatch};
pub use config::SimpleReplayBufferConfig;
pub use step_proc::{SimpleStepProcessor, SimpleStepProcessorConfig};
