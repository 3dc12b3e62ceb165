//! Missed-Event Reconciliation Task
//!
//! Background task that periodically queries the change feed for events
//! recorded after the last-seen checkpoint and replays them through the
//! invalidation cascade. This is the safety net under the live
//! subscription: even if delivery drops silently, every invalidation
//! arrives within one poll interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::invalidation::{ChangeFeed, InvalidationListener};

/// Spawns a background task that reconciles missed invalidation events.
///
/// The task runs in an infinite loop, sleeping for the configured
/// interval between polls. Query failures are logged inside the listener
/// and leave the checkpoint untouched, so the same window is retried on
/// the next tick.
///
/// # Arguments
/// * `listener` - The shared invalidation listener
/// * `feed` - The change-event feed to poll
/// * `interval_secs` - Seconds between reconciliation polls
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it during teardown.
pub fn spawn_reconcile_task(
    listener: InvalidationListener,
    feed: Arc<dyn ChangeFeed>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting reconciliation task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;
            listener.reconcile_once(&feed).await;
        }
    })
}
