//! Record storage and aggregation.
use super::{Record, RecordValue};
use std::collections::HashSet;

/// A storage of records with aggregation.
///
/// Scalar values sharing a key are aggregated by their mean on
/// [`RecordStorage::aggregate`]; for other value types the latest
/// occurrence wins.
pub struct RecordStorage {
    data: Vec<Record>,
}

fn mean(vs: &Vec<f32>) -> RecordValue {
    RecordValue::Scalar(vs.iter().map(|v| *v).sum::<f32>() / vs.len() as f32)
}

impl RecordStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self { data: vec![] }
    }

    /// Stores the given record.
    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    fn get_keys(&self) -> HashSet<String> {
        let mut keys = HashSet::new();
        for record in self.data.iter() {
            for k in record.keys() {
                keys.insert(k.clone());
            }
        }
        keys
    }

    fn latest(&self, key: &str) -> RecordValue {
        for record in self.data.iter().rev() {
            if let Some(value) = record.get(key) {
                return value.clone();
            }
        }
        unreachable!("keys are collected from the stored records");
    }

    fn scalars(&self, key: &str) -> Vec<f32> {
        self.data
            .iter()
            .filter_map(|record| match record.get(key) {
                Some(RecordValue::Scalar(v)) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Returns the aggregated record and clears the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut record = Record::empty();

        for key in self.get_keys() {
            let value = match self.latest(&key) {
                RecordValue::Scalar(_) => mean(&self.scalars(&key)),
                value => value,
            };
            record.insert(key, value);
        }

        self.data = vec![];
        record
    }
}

impl Default for RecordStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RecordStorage;
    use crate::record::Record;

    #[test]
    fn test_aggregate_scalar_mean() {
        let mut storage = RecordStorage::new();
        storage.store(Record::from_scalar("loss", 1.0));
        storage.store(Record::from_scalar("loss", 3.0));
        storage.store(Record::from_scalar("ent_coef", 0.2));

        let record = storage.aggregate();
        assert_eq!(record.get_scalar("loss").unwrap(), 2.0);
        assert_eq!(record.get_scalar("ent_coef").unwrap(), 0.2);

        // storage is cleared after aggregation
        assert!(storage.aggregate().is_empty());
    }
}
