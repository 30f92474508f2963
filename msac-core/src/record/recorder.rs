use super::Record;

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Writes a record to the [`Recorder`].
    fn write(&mut self, record: Record);
}

/// Stores records, then writes values aggregated from them on flush.
pub trait AggregateRecorder: Recorder {
    /// Stores the record.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records.
    fn flush(&mut self, step: i64);
}
