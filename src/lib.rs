//! sched_cache - Multi-tier client cache for scheduling data
//!
//! An in-memory entry store backed by a durable mirror, with
//! volatility-class TTL policies, dependency-graph invalidation driven
//! by an external change-event feed, missed-event reconciliation, and
//! incrementally-maintained performance metrics.

pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod manager;
pub mod mirror;
pub mod tasks;

pub use cache::{
    CacheEntry, DurationPolicy, EntryStore, MetricsRecorder, PerformanceMetrics,
};
pub use config::Config;
pub use error::{CacheError, Result};
pub use invalidation::{
    CacheUpdateNotification, ChangeFeed, DependencyGraph, InvalidationEvent, InvalidationListener,
    MemoryChangeFeed, OperationType, SubscriptionState,
};
pub use manager::{CacheManager, CacheTasks, ConsistencyReport};
pub use mirror::{DurableMirror, DurableStore, DurableStoreError, MemoryDurableStore};
