//! Error types for the cache manager
//!
//! Provides unified error handling using thiserror.
//!
//! Only two variants ever reach callers of the public facade: `Fetch`
//! (the caller's own data loader rejected) and `Serialization` (the
//! caller's type could not be encoded or decoded). Everything else is
//! internal and is logged rather than propagated, because the cache is
//! an optimization layer that must never block the underlying data path.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache manager.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The caller-supplied fetch function failed on a cache miss
    #[error("Fetch failed for key '{key}': {reason}")]
    Fetch { key: String, reason: anyhow::Error },

    /// A cached value could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A dependency graph failed construction-time validation
    #[error("Invalid dependency graph: {0}")]
    InvalidGraph(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache manager.
pub type Result<T> = std::result::Result<T, CacheError>;
