//! TensorBoard recorder for training metrics.
use msac_core::record::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Scalar values are written as TensorBoard scalars. When used as an
/// [`AggregateRecorder`], stored records are aggregated by
/// [`RecordStorage`] and written at the flush step.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    storage: RecordStorage,
    ignore_unsupported_value: bool,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "n_opts".to_string(),
            storage: RecordStorage::new(),
            ignore_unsupported_value: true,
        }
    }

    /// Construct a [`TensorboardRecorder`] with checking unsupported record value.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "n_opts".to_string(),
            storage: RecordStorage::new(),
            ignore_unsupported_value: false,
        }
    }

    fn write_scalars(&mut self, record: Record, step: usize) {
        for (k, v) in record.iter() {
            if *k != self.step_key {
                match v {
                    RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                    RecordValue::DateTime(_) => {} // discard value
                    _ => {
                        if !self.ignore_unsupported_value {
                            panic!("Unsupported value: {:?}", (k, v));
                        }
                    }
                };
            }
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord.
    ///
    /// The training step is taken from the record entry named `n_opts`,
    /// which must be a [`RecordValue::Scalar`].
    fn write(&mut self, record: Record) {
        let step = match record
            .get(&self.step_key)
            .unwrap_or_else(|| panic!("Record has no {} entry", self.step_key))
        {
            RecordValue::Scalar(v) => *v as usize,
            _ => panic!("{} must be a scalar", self.step_key),
        };

        self.write_scalars(record, step);
    }
}

impl AggregateRecorder for TensorboardRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let record = self.storage.aggregate();
        self.write_scalars(record, step as usize);
        self.writer.flush();
    }
}
