//! Cache Module
//!
//! In-memory entry storage, TTL policy resolution and performance
//! metrics for the cache manager.

mod entry;
mod metrics;
mod policy;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use metrics::{MetricsRecorder, PerformanceMetrics};
pub use policy::{
    DurationPolicy, DYNAMIC_TTL_MS, LIVE_STATUS_TTL_MS, STATIC_TTL_MS, VALIDATION_TTL_MS,
};
pub use store::EntryStore;
