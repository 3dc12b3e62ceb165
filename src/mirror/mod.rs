//! Durable Mirror Module
//!
//! Best-effort persistence of cache entries to a durable key-value
//! store, enabling warm-start after a process restart.

mod persist;
mod store;

// Re-export public types
pub use persist::DurableMirror;
pub use store::{DurableStore, DurableStoreError, MemoryDurableStore};
