//! Errors in the crate.
use thiserror::Error;

/// Errors of the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The key is not found in a record.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// The value for the key has an unexpected type.
    #[error("Record value type error, expected {0}")]
    RecordValueTypeError(String),

    /// The replay buffer does not have enough transitions for a batch.
    #[error("Not enough transitions in the replay buffer: {0} < {1}")]
    NotEnoughTransitions(usize, usize),
}
