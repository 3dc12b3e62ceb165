//! Metrics Resample Task
//!
//! Background task that periodically re-measures the entry count and the
//! serialized-length memory estimate. Sampling on a timer instead of on
//! every mutation keeps the write path cheap at the cost of gauge
//! precision.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{EntryStore, MetricsRecorder};

/// Spawns a background task that refreshes the metrics size gauges.
///
/// # Arguments
/// * `store` - Shared entry store to measure
/// * `metrics` - Shared metrics recorder to update
/// * `interval_secs` - Seconds between samples
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it during teardown.
pub fn spawn_resample_task(
    store: Arc<RwLock<EntryStore>>,
    metrics: Arc<RwLock<MetricsRecorder>>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting metrics resample task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let (size, memory) = {
                let store = store.read().await;
                (store.len(), store.estimated_memory_bytes())
            };
            metrics.write().await.resample(size, memory);

            debug!(size, memory, "resampled cache gauges");
        }
    })
}
