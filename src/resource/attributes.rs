use std::collections::{HashMap, HashSet};

use crate::core::Value;
use crate::repository::Record;

/// Loaded attribute values plus the originals they are compared against.
///
/// A name missing from `values` has never been materialized, which is not
/// the same as being loaded as `Null`. `originals` only holds entries for
/// attributes fetched from the store or changed since the last checkpoint.
/// `unknown` names attributes overwritten before their stored value was
/// ever fetched.
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    values: HashMap<String, Value>,
    originals: HashMap<String, Value>,
    unknown: HashSet<String>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    pub fn original(&self, name: &str) -> Option<&Value> {
        self.originals.get(name)
    }

    pub fn has_original(&self, name: &str) -> bool {
        self.originals.contains_key(name)
    }

    pub fn originals(&self) -> &HashMap<String, Value> {
        &self.originals
    }

    /// Records `value` as the original of `name` unless one is already held.
    pub fn record_original(&mut self, name: &str, value: Value) {
        self.originals.entry(name.to_string()).or_insert(value);
    }

    pub fn forget_original(&mut self, name: &str) {
        self.originals.remove(name);
        self.unknown.remove(name);
    }

    pub fn mark_original_unknown(&mut self, name: &str) {
        self.unknown.insert(name.to_string());
    }

    pub fn is_original_unknown(&self, name: &str) -> bool {
        self.unknown.contains(name)
    }

    /// Materializes a fetched row: every fetched value becomes both the
    /// current value and its original.
    pub fn load(&mut self, record: Record) {
        for (name, value) in record {
            self.unknown.remove(&name);
            self.originals.insert(name.clone(), value.clone());
            self.values.insert(name, value);
        }
    }

    /// Current values become the new baseline.
    pub fn checkpoint(&mut self) {
        self.originals.clear();
        self.unknown.clear();
    }

    /// Drops every original, then records `Null` as the original of each
    /// loaded attribute, so the values read as never persisted.
    pub fn forget_persisted(&mut self) {
        self.originals.clear();
        self.unknown.clear();
        for name in self.values.keys() {
            self.originals.insert(name.clone(), Value::Null);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_null_differs_from_unloaded() {
        let mut store = AttributeStore::new();
        assert!(!store.is_loaded("nickname"));

        store.set("nickname", Value::Null);
        assert!(store.is_loaded("nickname"));
        assert_eq!(store.get("nickname"), Some(&Value::Null));
    }

    #[test]
    fn test_set_does_not_snapshot() {
        let mut store = AttributeStore::new();
        store.set("name", Value::from("A"));
        assert!(store.originals().is_empty());
    }

    #[test]
    fn test_load_writes_values_and_originals() {
        let mut store = AttributeStore::new();
        let mut record = Record::new();
        record.insert("body".to_string(), Value::from("text"));
        store.load(record);

        assert_eq!(store.get("body"), Some(&Value::from("text")));
        assert_eq!(store.original("body"), Some(&Value::from("text")));
    }

    #[test]
    fn test_record_original_keeps_first_value() {
        let mut store = AttributeStore::new();
        store.record_original("id", Value::Integer(1));
        store.record_original("id", Value::Integer(2));
        assert_eq!(store.original("id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_forget_persisted_nulls_every_loaded_original() {
        let mut store = AttributeStore::new();
        store.set("id", Value::Integer(1));
        store.set("name", Value::from("A"));
        store.record_original("name", Value::from("Z"));

        store.forget_persisted();
        assert_eq!(store.original("id"), Some(&Value::Null));
        assert_eq!(store.original("name"), Some(&Value::Null));

        store.checkpoint();
        assert!(store.originals().is_empty());
    }

    #[test]
    fn test_unknown_original_cleared_by_load_and_checkpoint() {
        let mut store = AttributeStore::new();
        store.mark_original_unknown("body");
        assert!(store.is_original_unknown("body"));

        let mut record = Record::new();
        record.insert("body".to_string(), Value::from("text"));
        store.load(record);
        assert!(!store.is_original_unknown("body"));

        store.mark_original_unknown("summary");
        store.checkpoint();
        assert!(!store.is_original_unknown("summary"));
    }
}
