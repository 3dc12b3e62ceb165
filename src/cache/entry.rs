//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.
//! The same struct doubles as the durable mirror's persisted record, so
//! it derives serde both ways.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value, opaque JSON
    pub data: Value,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Write counter for this key, incremented on every overwrite
    pub version: u64,
    /// Cache-key prefixes whose invalidation should also drop this entry
    pub dependencies: Vec<String>,
    /// Number of hits served from this entry
    pub access_count: u64,
    /// Timestamp of the most recent hit (Unix milliseconds)
    pub last_accessed: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl_ms` from now.
    ///
    /// # Arguments
    /// * `data` - The value to store
    /// * `ttl_ms` - Time-to-live in milliseconds
    /// * `version` - Write counter assigned by the store
    /// * `dependencies` - Advisory dependent-key prefixes
    pub fn new(data: Value, ttl_ms: u64, version: u64, dependencies: Vec<String>) -> Self {
        let now = current_timestamp_ms();
        Self {
            data,
            timestamp: now,
            expires_at: now + ttl_ms,
            version,
            dependencies,
            access_count: 0,
            last_accessed: now,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is considered expired when the current
    /// time is greater than or equal to the expiration time. Validity is
    /// never inferred any other way.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

    // == Touch ==
    /// Records a hit against this entry.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed = current_timestamp_ms();
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds.
    ///
    /// # Returns
    /// - `0` if the entry has expired
    /// - the remaining milliseconds otherwise
    pub fn ttl_remaining_ms(&self) -> u64 {
        let now = current_timestamp_ms();
        self.expires_at.saturating_sub(now)
    }

    // == Estimated Size ==
    /// Rough in-memory footprint estimate: serialized length of the data
    /// plus the fixed metadata fields. Used by the memory gauge, which is
    /// resampled on a timer rather than on every mutation.
    pub fn estimated_size(&self) -> usize {
        let data_len = serde_json::to_string(&self.data)
            .map(|s| s.len())
            .unwrap_or(0);
        let deps_len: usize = self.dependencies.iter().map(|d| d.len()).sum();
        data_len + deps_len + std::mem::size_of::<Self>()
    }

    // == Promoted ==
    /// Returns a copy of this entry prepared for promotion from the
    /// durable mirror into the in-memory store. Access telemetry is reset
    /// to reflect the promotion, not the original history; creation and
    /// expiry timestamps are preserved.
    pub fn promoted(&self) -> Self {
        let mut entry = self.clone();
        entry.access_count = 0;
        entry.last_accessed = current_timestamp_ms();
        entry
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
