//! Change Feed Module
//!
//! The change-event contract between the system of record and the cache:
//! a subscribable stream of invalidation events plus a point-in-time
//! query for events missed while the subscription was down.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// == Operation Type ==
/// Kind of change observed on a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Insert,
    Update,
    Delete,
}

// == Invalidation Event ==
/// A change record produced by the system of record. Immutable once
/// observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Identifier of the emitting source (connection, replica, tab)
    pub source_id: String,
    /// The table that changed
    pub table_name: String,
    /// The kind of change
    pub operation_type: OperationType,
    /// Row identifier, when the change is row-scoped
    pub affected_row_id: Option<String>,
    /// When the change was recorded upstream
    pub created_at: DateTime<Utc>,
}

impl InvalidationEvent {
    /// Creates an event stamped with the current time.
    pub fn new(
        source_id: impl Into<String>,
        table_name: impl Into<String>,
        operation_type: OperationType,
        affected_row_id: Option<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            table_name: table_name.into(),
            operation_type,
            affected_row_id,
            created_at: Utc::now(),
        }
    }
}

// == Cache Update Notification ==
/// Local broadcast payload emitted after every processed invalidation,
/// so subscribed consumers can decide to refetch.
#[derive(Debug, Clone, Serialize)]
pub struct CacheUpdateNotification {
    /// The table that changed
    pub table_name: String,
    /// The kind of change
    pub operation_type: OperationType,
    /// When the invalidation was processed locally
    pub timestamp: DateTime<Utc>,
}

// == Change Feed Trait ==
/// A subscribable stream of invalidation events backed by an external
/// system of record.
///
/// Reconnection of a dropped subscription is the feed's own concern; the
/// cache only reacts to delivered events and polls `events_since` for
/// ones it may have missed.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribes to live event delivery.
    fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent>;

    /// Returns events recorded strictly after `since`, oldest first.
    async fn events_since(&self, since: DateTime<Utc>) -> anyhow::Result<Vec<InvalidationEvent>>;
}

// == Memory Change Feed ==
/// In-process [`ChangeFeed`] retaining published events for replay.
///
/// Backs the test suite and same-process producers; a production feed
/// would front a backend change stream with the same contract.
#[derive(Debug)]
pub struct MemoryChangeFeed {
    sender: broadcast::Sender<InvalidationEvent>,
    history: Mutex<Vec<InvalidationEvent>>,
}

impl MemoryChangeFeed {
    /// Creates a feed with the given live-delivery buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Records an event and delivers it to live subscribers.
    ///
    /// Delivery failure (no subscribers) is not an error; the event stays
    /// in history for reconciliation.
    pub fn publish(&self, event: InvalidationEvent) {
        {
            let mut history = self.history.lock().expect("feed history lock poisoned");
            history.push(event.clone());
        }
        let _ = self.sender.send(event);
    }

    /// Records an event without live delivery, simulating a silently
    /// dropped subscription.
    pub fn publish_silently(&self, event: InvalidationEvent) {
        let mut history = self.history.lock().expect("feed history lock poisoned");
        history.push(event);
    }

    /// Number of events retained.
    pub fn history_len(&self) -> usize {
        self.history.lock().expect("feed history lock poisoned").len()
    }
}

impl Default for MemoryChangeFeed {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl ChangeFeed for MemoryChangeFeed {
    fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.sender.subscribe()
    }

    async fn events_since(&self, since: DateTime<Utc>) -> anyhow::Result<Vec<InvalidationEvent>> {
        let mut events: Vec<InvalidationEvent> = {
            let history = self.history.lock().expect("feed history lock poisoned");
            history
                .iter()
                .filter(|e| e.created_at > since)
                .cloned()
                .collect()
        };
        events.sort_by_key(|e| e.created_at);
        Ok(events)
    }
}
