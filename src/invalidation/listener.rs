//! Invalidation Listener Module
//!
//! Translates "source table X changed" into evictions across both cache
//! tiers, broadcasts a local notification so consumers can refetch, and
//! pre-warms a registered set of high-traffic fetches when a critical
//! table changes. The cache never queries the system of record for
//! freshness; this listener plus the reconciliation poll are the only
//! paths by which external changes reach it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{DurationPolicy, EntryStore};
use crate::invalidation::graph::{
    DependencyGraph, AGGREGATE_PREFIXES, CRITICAL_TABLES, MEMBERSHIP_TABLE, SCHEDULE_TABLE,
    TEAM_SCOPED_PREFIX,
};
use crate::invalidation::{CacheUpdateNotification, ChangeFeed, InvalidationEvent};
use crate::mirror::DurableMirror;

// == Subscription State ==
/// Lifecycle of the live subscription.
///
/// There is no reconnecting state: reconnection is the feed's own
/// responsibility, and the reconciliation poll covers events missed
/// while the subscription was down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Disconnected,
    Subscribing,
    Active,
    Processing,
}

// == Prewarmer ==
/// Future type produced by a registered pre-warm fetch.
pub type PrewarmFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// A named high-traffic fetch re-run after critical-table changes.
#[derive(Clone)]
pub struct Prewarmer {
    /// Cache key repopulated by this fetch
    pub key: String,
    /// The fetch itself
    pub fetch: Arc<dyn Fn() -> PrewarmFuture + Send + Sync>,
}

// == Invalidation Listener ==
/// Applies invalidation events to the entry store and durable mirror.
///
/// Cheap to clone; all state is shared. The same instance serves the
/// live subscription loop and the reconciliation poll, so both paths run
/// the identical eviction cascade and converge on the same end state
/// (eviction is idempotent).
#[derive(Clone)]
pub struct InvalidationListener {
    store: Arc<RwLock<EntryStore>>,
    mirror: DurableMirror,
    graph: Arc<DependencyGraph>,
    policy: DurationPolicy,
    notifier: broadcast::Sender<CacheUpdateNotification>,
    prewarmers: Arc<RwLock<Vec<Prewarmer>>>,
    checkpoint: Arc<RwLock<DateTime<Utc>>>,
    state: Arc<RwLock<SubscriptionState>>,
}

impl InvalidationListener {
    // == Constructor ==
    pub fn new(
        store: Arc<RwLock<EntryStore>>,
        mirror: DurableMirror,
        graph: Arc<DependencyGraph>,
        policy: DurationPolicy,
        notifier: broadcast::Sender<CacheUpdateNotification>,
        prewarmers: Arc<RwLock<Vec<Prewarmer>>>,
    ) -> Self {
        Self {
            store,
            mirror,
            graph,
            policy,
            notifier,
            prewarmers,
            checkpoint: Arc::new(RwLock::new(Utc::now())),
            state: Arc::new(RwLock::new(SubscriptionState::Disconnected)),
        }
    }

    /// Current subscription state.
    pub async fn state(&self) -> SubscriptionState {
        *self.state.read().await
    }

    /// Timestamp of the newest event observed through either path.
    pub async fn checkpoint(&self) -> DateTime<Utc> {
        *self.checkpoint.read().await
    }

    // == Process Event ==
    /// Runs the eviction cascade for one event.
    ///
    /// Order of operations: table-name eviction, declared dependent
    /// prefixes, row-scoped key (plus the coarse team-wide sweep for
    /// fan-out tables), aggregate rollups, local notification, and
    /// finally best-effort pre-warming for critical tables.
    pub async fn process_event(&self, event: &InvalidationEvent) {
        self.enter_processing().await;

        let mut evicted = 0usize;

        // 1. Everything keyed on the table itself
        evicted += self.evict(&event.table_name).await;

        // 2. Declared dependents
        for dep in self.graph.dependents(&event.table_name) {
            evicted += self.evict(dep).await;
        }

        // 3. Row-scoped key, plus the coarse team-wide sweep for tables
        //    that fan out to every team-scoped view
        if let Some(row_id) = &event.affected_row_id {
            evicted += self
                .evict(&format!("{}_{}", event.table_name, row_id))
                .await;
            if event.table_name == MEMBERSHIP_TABLE || event.table_name == SCHEDULE_TABLE {
                evicted += self.evict(TEAM_SCOPED_PREFIX).await;
            }
        }

        // 4. Aggregate rollups are dirty on any underlying change
        for prefix in AGGREGATE_PREFIXES {
            evicted += self.evict(prefix).await;
        }

        debug!(
            table = %event.table_name,
            op = ?event.operation_type,
            evicted,
            "processed invalidation event"
        );

        // 5. Tell local consumers; no subscribers is fine
        let _ = self.notifier.send(CacheUpdateNotification {
            table_name: event.table_name.clone(),
            operation_type: event.operation_type,
            timestamp: Utc::now(),
        });

        // 6. Repopulate high-traffic keys before the next read arrives
        if CRITICAL_TABLES.contains(&event.table_name.as_str()) {
            self.prewarm().await;
        }

        self.advance_checkpoint(event.created_at).await;
        self.leave_processing().await;
    }

    /// Evicts all entries in both tiers whose key contains `pattern`.
    async fn evict(&self, pattern: &str) -> usize {
        let from_store = self.store.write().await.delete_matching(pattern);
        let from_mirror = self.mirror.remove_matching(pattern);
        from_store + from_mirror
    }

    /// Re-runs every registered pre-warm fetch, best-effort.
    async fn prewarm(&self) {
        let warmers: Vec<Prewarmer> = self.prewarmers.read().await.clone();
        for warmer in warmers {
            match (warmer.fetch)().await {
                Ok(data) => {
                    let ttl = self.policy.resolve(&warmer.key);
                    let entry = self
                        .store
                        .write()
                        .await
                        .set(warmer.key.clone(), data, ttl, vec![]);
                    if let Err(e) = self.mirror.save(&warmer.key, &entry) {
                        debug!(key = %warmer.key, error = %e, "pre-warm durable write failed");
                    }
                    debug!(key = %warmer.key, "pre-warmed cache entry");
                }
                Err(e) => {
                    warn!(key = %warmer.key, error = %e, "pre-warm fetch failed");
                }
            }
        }
    }

    /// Moves the checkpoint forward, never backward.
    async fn advance_checkpoint(&self, seen: DateTime<Utc>) {
        let mut checkpoint = self.checkpoint.write().await;
        if seen > *checkpoint {
            *checkpoint = seen;
        }
    }

    async fn enter_processing(&self) {
        let mut state = self.state.write().await;
        if *state == SubscriptionState::Active {
            *state = SubscriptionState::Processing;
        }
    }

    async fn leave_processing(&self) {
        let mut state = self.state.write().await;
        if *state == SubscriptionState::Processing {
            *state = SubscriptionState::Active;
        }
    }

    // == Reconcile Once ==
    /// Queries the feed for events missed since the checkpoint and
    /// replays them, oldest first, through the same cascade as live
    /// delivery.
    ///
    /// On a query failure the checkpoint is left untouched so the same
    /// window is retried next tick: at-least-once, never at-most-once.
    pub async fn reconcile_once(&self, feed: &Arc<dyn ChangeFeed>) {
        let since = self.checkpoint().await;
        match feed.events_since(since).await {
            Ok(events) => {
                if events.is_empty() {
                    debug!("reconciliation found no missed events");
                    return;
                }
                info!(count = events.len(), "reconciling missed invalidation events");
                for event in &events {
                    self.process_event(event).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "reconciliation query failed, will retry next tick");
            }
        }
    }

    // == Run ==
    /// Drives the live subscription until the feed closes.
    ///
    /// A lagged receiver (events dropped from the delivery buffer) is
    /// only logged: the reconciliation poll replays whatever was missed.
    pub async fn run(self, feed: Arc<dyn ChangeFeed>) {
        {
            let mut state = self.state.write().await;
            *state = SubscriptionState::Subscribing;
        }
        let mut rx = feed.subscribe();
        {
            let mut state = self.state.write().await;
            *state = SubscriptionState::Active;
        }
        info!("invalidation listener active");

        loop {
            match rx.recv().await {
                Ok(event) => self.process_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "live subscription lagged, reconciliation will catch up");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        let mut state = self.state.write().await;
        *state = SubscriptionState::Disconnected;
        info!("invalidation listener disconnected");
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self, feed: Arc<dyn ChangeFeed>) -> JoinHandle<()> {
        tokio::spawn(self.run(feed))
    }
}
