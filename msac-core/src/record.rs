//! Types and traits for recording training metrics.
//!
//! [`Record`] is a container of key-value pairs produced during training and
//! evaluation, e.g., losses and diagnostic quantities of the M-SAC learner.
//! [`Recorder`] is an output destination of records, e.g., a TensorBoard
//! writer, while [`RecordStorage`] aggregates stored records between flushes.
mod base;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
