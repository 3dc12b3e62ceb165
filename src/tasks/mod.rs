//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the cache
//! manager.
//!
//! # Tasks
//! - Reconciliation: replays invalidation events missed by the live
//!   subscription at configured intervals
//! - Resample: refreshes the metrics size and memory gauges

mod reconcile;
mod resample;

pub use reconcile::spawn_reconcile_task;
pub use resample::spawn_resample_task;
