//! Entry Store Module
//!
//! In-memory key-to-entry mapping, authoritative for lookups during the
//! process lifetime. All mutations are synchronous; callers serialize
//! access through a lock, so no partial overwrite is ever observable.

use std::collections::HashMap;

use serde_json::Value;

use crate::cache::CacheEntry;

// == Entry Store ==
/// In-memory cache storage with lazy TTL expiry.
///
/// Absence is represented by `None`, never an error: a missing or expired
/// key is the normal miss path, not a failure.
#[derive(Debug, Default)]
pub struct EntryStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
}

impl EntryStore {
    // == Constructor ==
    /// Creates a new empty EntryStore.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    // == Get ==
    /// Retrieves the entry for a key.
    ///
    /// Returns the entry only while it is unexpired, recording the hit in
    /// the entry's access telemetry. Expired entries are left in place
    /// (removal is a separate, explicit cleanup operation) but are never
    /// returned.
    ///
    /// # Arguments
    /// * `key` - The key to retrieve
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        let entry = self.entries.get_mut(key)?;
        if entry.is_expired() {
            return None;
        }
        entry.touch();
        Some(&*entry)
    }

    // == Set ==
    /// Stores a value under a key, replacing any prior entry.
    ///
    /// The write counter continues from the prior entry's version, or
    /// starts at 1 for a fresh key.
    ///
    /// Returns a clone of the stored entry so callers can mirror it to
    /// durable storage without a second lookup.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `data` - The value to store
    /// * `ttl_ms` - Time-to-live in milliseconds
    /// * `dependencies` - Advisory dependent-key prefixes
    pub fn set(
        &mut self,
        key: String,
        data: Value,
        ttl_ms: u64,
        dependencies: Vec<String>,
    ) -> CacheEntry {
        let version = self.entries.get(&key).map(|e| e.version + 1).unwrap_or(1);
        let entry = CacheEntry::new(data, ttl_ms, version, dependencies);
        self.entries.insert(key, entry.clone());
        entry
    }

    // == Insert Entry ==
    /// Inserts a pre-built entry, used when promoting a durable mirror hit
    /// into memory. The entry keeps its original timestamps and version.
    pub fn insert_entry(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether an entry was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Delete Matching ==
    /// Removes every entry whose key contains `pattern` as a substring.
    ///
    /// An empty pattern matches nothing: it would otherwise match every
    /// key, and no caller legitimately wants that through this path.
    ///
    /// # Returns
    /// The number of entries removed.
    pub fn delete_matching(&mut self, pattern: &str) -> usize {
        if pattern.is_empty() {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.contains(pattern));
        before - self.entries.len()
    }

    // == Clear ==
    /// Removes all entries. Returns the number removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    // == Contains ==
    /// Returns true if an unexpired entry exists for the key, without
    /// touching access telemetry.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false)
    }

    // == Iteration ==
    /// Iterates over all entries, expired ones included. Used by the
    /// consistency report and the memory gauge.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    // == Memory Estimate ==
    /// Sums the serialized-length estimates of all entries.
    pub fn estimated_memory_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, entry)| key.len() + entry.estimated_size())
            .sum()
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_store_new() {
        let store = EntryStore::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = EntryStore::new();

        store.set("teams_1".to_string(), json!("alpha"), 60_000, vec![]);
        let entry = store.get("teams_1").unwrap();

        assert_eq!(entry.data, json!("alpha"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = EntryStore::new();
        assert!(store.get("nonexistent").is_none());
    }

    #[test]
    fn test_store_get_increments_access_telemetry() {
        let mut store = EntryStore::new();
        store.set("k".to_string(), json!(1), 60_000, vec![]);

        store.get("k");
        store.get("k");
        let entry = store.get("k").unwrap();

        assert_eq!(entry.access_count, 3);
    }

    #[test]
    fn test_store_overwrite_increments_version() {
        let mut store = EntryStore::new();

        store.set("k".to_string(), json!("v1"), 60_000, vec![]);
        store.set("k".to_string(), json!("v2"), 60_000, vec![]);

        let entry = store.get("k").unwrap();
        assert_eq!(entry.data, json!("v2"));
        assert_eq!(entry.version, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_version_restarts_after_delete() {
        let mut store = EntryStore::new();

        store.set("k".to_string(), json!("v1"), 60_000, vec![]);
        store.set("k".to_string(), json!("v2"), 60_000, vec![]);
        store.delete("k");
        store.set("k".to_string(), json!("v3"), 60_000, vec![]);

        assert_eq!(store.get("k").unwrap().version, 1);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = EntryStore::new();

        store.set("teams_1".to_string(), json!("v"), 100, vec![]);
        assert!(store.get("teams_1").is_some());

        sleep(Duration::from_millis(150));

        // Expired entry reads as absent even though never evicted
        assert!(store.get("teams_1").is_none());
        assert_eq!(store.len(), 1, "lazy expiry leaves the record in place");
    }

    #[test]
    fn test_store_delete() {
        let mut store = EntryStore::new();

        store.set("k".to_string(), json!("v"), 60_000, vec![]);
        assert!(store.delete("k"));
        assert!(!store.delete("k"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_delete_matching() {
        let mut store = EntryStore::new();

        store.set("schedule_entries_week_5".to_string(), json!(1), 60_000, vec![]);
        store.set("schedule_entries_week_6".to_string(), json!(2), 60_000, vec![]);
        store.set("teams_1".to_string(), json!(3), 60_000, vec![]);

        let removed = store.delete_matching("schedule_entries");

        assert_eq!(removed, 2);
        assert!(store.get("schedule_entries_week_5").is_none());
        assert!(store.get("teams_1").is_some());
    }

    #[test]
    fn test_store_delete_matching_substring_not_prefix() {
        let mut store = EntryStore::new();

        store.set("report_teams_q3".to_string(), json!(1), 60_000, vec![]);

        // Containment match, not prefix match
        assert_eq!(store.delete_matching("teams"), 1);
    }

    #[test]
    fn test_store_delete_matching_empty_pattern_is_noop() {
        let mut store = EntryStore::new();

        store.set("a".to_string(), json!(1), 60_000, vec![]);
        store.set("b".to_string(), json!(2), 60_000, vec![]);

        assert_eq!(store.delete_matching(""), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_delete_matching_idempotent() {
        let mut store = EntryStore::new();

        store.set("teams_1".to_string(), json!(1), 60_000, vec![]);

        assert_eq!(store.delete_matching("teams"), 1);
        assert_eq!(store.delete_matching("teams"), 0);
    }

    #[test]
    fn test_store_clear() {
        let mut store = EntryStore::new();

        store.set("a".to_string(), json!(1), 60_000, vec![]);
        store.set("b".to_string(), json!(2), 60_000, vec![]);

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_cleanup_expired() {
        let mut store = EntryStore::new();

        store.set("short".to_string(), json!(1), 50, vec![]);
        store.set("long".to_string(), json!(2), 60_000, vec![]);

        sleep(Duration::from_millis(80));

        let removed = store.cleanup_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("long").is_some());
    }

    #[test]
    fn test_store_contains_does_not_touch() {
        let mut store = EntryStore::new();
        store.set("k".to_string(), json!(1), 60_000, vec![]);

        assert!(store.contains("k"));
        assert_eq!(store.get("k").unwrap().access_count, 1);
    }

    #[test]
    fn test_store_insert_entry_preserves_metadata() {
        let mut store = EntryStore::new();
        let entry = CacheEntry::new(json!("warm"), 60_000, 7, vec![]);
        let original_timestamp = entry.timestamp;

        store.insert_entry("warm_key".to_string(), entry);

        let restored = store.get("warm_key").unwrap();
        assert_eq!(restored.version, 7);
        assert_eq!(restored.timestamp, original_timestamp);
    }

    #[test]
    fn test_store_estimated_memory() {
        let mut store = EntryStore::new();
        assert_eq!(store.estimated_memory_bytes(), 0);

        store.set("k".to_string(), json!("x".repeat(100)), 60_000, vec![]);
        assert!(store.estimated_memory_bytes() > 100);
    }
}
