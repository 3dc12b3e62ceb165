//! Durable Store Contract
//!
//! The cache manager persists entries through this synchronous,
//! string-keyed key-value contract. The backing implementation is
//! supplied by the application (the production backend is shaped like
//! browser local storage: finite capacity, quota-exceeded write
//! failures, no cross-process locking).

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

// == Durable Store Error ==
/// Failure modes of the durable key-value backend.
#[derive(Error, Debug)]
pub enum DurableStoreError {
    /// The backend is out of space
    #[error("Durable store quota exceeded")]
    QuotaExceeded,

    /// Any other backend failure
    #[error("Durable store backend error: {0}")]
    Backend(String),
}

// == Durable Store Trait ==
/// Synchronous string-keyed storage with finite capacity.
///
/// Reads never fail: a backend that cannot produce a value reports
/// absence, and the mirror treats undecodable values as absent too.
pub trait DurableStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any prior value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), DurableStoreError>;

    /// Removes the value stored under `key`, if any.
    fn remove_item(&self, key: &str);

    /// Enumerates every key currently stored.
    fn keys(&self) -> Vec<String>;
}

// == Memory Durable Store ==
/// In-memory [`DurableStore`] with an optional byte budget.
///
/// Serves as the in-process default and as the quota-failure simulator in
/// tests. The budget counts key and value bytes, which is close enough to
/// the string-based accounting of the production backend.
#[derive(Debug, Default)]
pub struct MemoryDurableStore {
    items: Mutex<HashMap<String, String>>,
    max_bytes: Option<usize>,
}

impl MemoryDurableStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes pushing usage past `max_bytes`.
    pub fn with_capacity_bytes(max_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            max_bytes: Some(max_bytes),
        }
    }

    /// Current usage in bytes (keys + values).
    pub fn used_bytes(&self) -> usize {
        let items = self.items.lock().expect("durable store lock poisoned");
        items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.lock().expect("durable store lock poisoned").len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableStore for MemoryDurableStore {
    fn get_item(&self, key: &str) -> Option<String> {
        let items = self.items.lock().expect("durable store lock poisoned");
        items.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), DurableStoreError> {
        let mut items = self.items.lock().expect("durable store lock poisoned");
        if let Some(budget) = self.max_bytes {
            let existing = items.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let used: usize = items.iter().map(|(k, v)| k.len() + v.len()).sum();
            let projected = used - existing + key.len() + value.len();
            if projected > budget {
                return Err(DurableStoreError::QuotaExceeded);
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        let mut items = self.items.lock().expect("durable store lock poisoned");
        items.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        let items = self.items.lock().expect("durable store lock poisoned");
        items.keys().cloned().collect()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = MemoryDurableStore::new();

        store.set_item("k", "v").unwrap();
        assert_eq!(store.get_item("k"), Some("v".to_string()));
    }

    #[test]
    fn test_get_absent() {
        let store = MemoryDurableStore::new();
        assert_eq!(store.get_item("missing"), None);
    }

    #[test]
    fn test_remove() {
        let store = MemoryDurableStore::new();

        store.set_item("k", "v").unwrap();
        store.remove_item("k");
        assert_eq!(store.get_item("k"), None);
    }

    #[test]
    fn test_keys_enumeration() {
        let store = MemoryDurableStore::new();

        store.set_item("a", "1").unwrap();
        store.set_item("b", "2").unwrap();

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_quota_exceeded() {
        let store = MemoryDurableStore::with_capacity_bytes(10);

        store.set_item("a", "12345").unwrap(); // 6 bytes
        let result = store.set_item("b", "123456789");
        assert!(matches!(result, Err(DurableStoreError::QuotaExceeded)));
    }

    #[test]
    fn test_quota_overwrite_counts_replaced_bytes() {
        let store = MemoryDurableStore::with_capacity_bytes(10);

        store.set_item("a", "123456789").unwrap(); // full
        // Overwriting the same key with a smaller value must succeed
        store.set_item("a", "1").unwrap();
        assert_eq!(store.get_item("a"), Some("1".to_string()));
    }

    #[test]
    fn test_used_bytes() {
        let store = MemoryDurableStore::new();
        store.set_item("ab", "cd").unwrap();
        assert_eq!(store.used_bytes(), 4);
    }
}
