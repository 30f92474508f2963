//! Base implementation of records for logging.
use crate::error::CoreError;
use chrono::prelude::{DateTime, Local};
use std::{
    collections::{
        hash_map::{IntoIter, Iter, Keys},
        HashMap,
    },
    convert::Into,
    iter::IntoIterator,
};

/// Represents possible types of values in a [`Record`].
#[derive(Debug, Clone)]
pub enum RecordValue {
    /// A single floating-point value, typically a metric like a loss.
    Scalar(f32),

    /// A timestamp with local timezone.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array of floating-point values.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

/// A container of key-value pairs of various data types.
#[derive(Debug)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys in the record.
    pub fn keys(&self) -> Keys<'_, String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns an iterator that consumes the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Returns `true` if the record has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges two records, consuming both.
    ///
    /// If both records contain the same key, the value from the second record
    /// overwrites the value from the first record.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place.
    pub fn merge_inplace(&mut self, record: Record) {
        for (k, v) in record.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, CoreError> {
        if let Some(v) = self.0.get(k) {
            match v {
                RecordValue::Scalar(v) => Ok(*v),
                _ => Err(CoreError::RecordValueTypeError("Scalar".to_string())),
            }
        } else {
            Err(CoreError::RecordKeyError(k.to_string()))
        }
    }

    /// Gets a 1-dimensional array from the record.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, CoreError> {
        if let Some(v) = self.0.get(k) {
            match v {
                RecordValue::Array1(v) => Ok(v.clone()),
                _ => Err(CoreError::RecordValueTypeError("Array1".to_string())),
            }
        } else {
            Err(CoreError::RecordKeyError(k.to_string()))
        }
    }

    /// Gets a string from the record.
    pub fn get_string(&self, k: &str) -> Result<String, CoreError> {
        if let Some(v) = self.0.get(k) {
            match v {
                RecordValue::String(s) => Ok(s.clone()),
                _ => Err(CoreError::RecordValueTypeError("String".to_string())),
            }
        } else {
            Err(CoreError::RecordKeyError(k.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordValue};

    #[test]
    fn test_scalar_access() {
        let mut record = Record::from_scalar("loss", 0.5);
        record.insert("alpha", RecordValue::Scalar(0.2));

        assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
        assert_eq!(record.get_scalar("alpha").unwrap(), 0.2);
        assert!(record.get_scalar("unknown").is_err());
    }

    #[test]
    fn test_typed_access() {
        let mut record = Record::empty();
        record.insert("values", RecordValue::Array1(vec![1.0, 2.0]));
        record.insert("mode", RecordValue::String("dynamicshift".to_string()));

        assert_eq!(record.get_array1("values").unwrap(), vec![1.0, 2.0]);
        assert_eq!(record.get_string("mode").unwrap(), "dynamicshift");
        assert!(record.get_array1("mode").is_err());
    }

    #[test]
    fn test_merge_overwrites() {
        let r1 = Record::from_scalar("a", 1.0);
        let r2 = Record::from_slice(&[
            ("a", RecordValue::Scalar(2.0)),
            ("b", RecordValue::Scalar(3.0)),
        ]);
        let merged = r1.merge(r2);

        assert_eq!(merged.get_scalar("a").unwrap(), 2.0);
        assert_eq!(merged.get_scalar("b").unwrap(), 3.0);
    }
}
