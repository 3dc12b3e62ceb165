//! Invalidation Module
//!
//! Dependency-graph driven eviction: a change-event feed, the static
//! dependency graph, and the listener that applies events to both cache
//! tiers and broadcasts local update notifications.

mod feed;
mod graph;
mod listener;

// Re-export public types
pub use feed::{
    CacheUpdateNotification, ChangeFeed, InvalidationEvent, MemoryChangeFeed, OperationType,
};
pub use graph::{
    DependencyGraph, AGGREGATE_PREFIXES, CRITICAL_TABLES, MEMBERSHIP_TABLE, SCHEDULE_TABLE,
    SPRINT_CONFIG_TABLE, TEAM_SCOPED_PREFIX,
};
pub use listener::{InvalidationListener, PrewarmFuture, Prewarmer, SubscriptionState};
