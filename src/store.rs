//! Key/value store behind all short-lived bot state (pending events, fallback
//! counters, wizard sessions).
//!
//! Only the in-memory backend exists today; the trait keeps the engine and the
//! wizard independent of where their state lives.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

pub trait KeyValueStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;

    /// Insert or replace, returning the previous value
    fn set(&self, key: &str, value: V) -> Option<V>;

    /// Remove, returning the removed value
    fn delete(&self, key: &str) -> Option<V>;

    /// Remove only when `predicate` holds for the current value, atomically
    fn delete_if(&self, key: &str, predicate: &mut dyn FnMut(&V) -> bool) -> Option<V>;

    /// All entries whose key starts with `prefix`, ordered by key.
    /// An empty prefix returns everything.
    fn scan_prefix(&self, prefix: &str) -> Vec<(String, V)>;

    /// Atomically replace the value under `key` with `f(current)` and
    /// return the new value
    fn upsert(&self, key: &str, f: &mut dyn FnMut(Option<&V>) -> V) -> V;
}

/// Process-local store backed by an ordered map
#[derive(Debug)]
pub struct InMemoryStore<V> {
    entries: Mutex<BTreeMap<String, V>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, V>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send> KeyValueStore<V> for InMemoryStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: V) -> Option<V> {
        self.entries().insert(key.to_string(), value)
    }

    fn delete(&self, key: &str) -> Option<V> {
        self.entries().remove(key)
    }

    fn delete_if(&self, key: &str, predicate: &mut dyn FnMut(&V) -> bool) -> Option<V> {
        let mut entries = self.entries();
        if entries.get(key).is_some_and(|value| predicate(value)) {
            entries.remove(key)
        } else {
            None
        }
    }

    fn scan_prefix(&self, prefix: &str) -> Vec<(String, V)> {
        self.entries()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn upsert(&self, key: &str, f: &mut dyn FnMut(Option<&V>) -> V) -> V {
        let mut entries = self.entries();
        let value = f(entries.get(key));
        entries.insert(key.to_string(), value.clone());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        assert_eq!(store.set("a", 1), None);
        assert_eq!(store.set("a", 2), Some(1));
        assert_eq!(store.get("a"), Some(2));
        assert_eq!(store.delete("a"), Some(2));
        assert_eq!(store.delete("a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_if_checks_current_value() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        store.set("a", 1);
        assert_eq!(store.delete_if("a", &mut |value| *value == 2), None);
        assert_eq!(store.get("a"), Some(1));
        assert_eq!(store.delete_if("a", &mut |value| *value == 1), Some(1));
        assert_eq!(store.delete_if("missing", &mut |_| true), None);
    }

    #[test]
    fn test_scan_prefix_is_ordered_and_bounded() {
        let store: InMemoryStore<&'static str> = InMemoryStore::new();
        store.set("12_raids", "c");
        store.set("1_raids", "b");
        store.set("1_mp", "a");
        store.set("2_mp", "d");

        let keys: Vec<String> = store.scan_prefix("1_").into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["1_mp".to_string(), "1_raids".to_string()]);

        assert_eq!(store.scan_prefix("").len(), 4);
        assert!(store.scan_prefix("3_").is_empty());
    }

    #[test]
    fn test_upsert_increments() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        let mut bump = |current: Option<&u32>| current.copied().unwrap_or(0) + 1;
        assert_eq!(store.upsert("counter", &mut bump), 1);
        assert_eq!(store.upsert("counter", &mut bump), 2);
        assert_eq!(store.get("counter"), Some(2));
    }
}
