//! Cache Manager Module
//!
//! The public facade composing both cache tiers, the TTL policy, the
//! dependency graph and the invalidation machinery. One `CacheManager`
//! is built at the application's composition root and cloned into
//! consumers; clones share all state.
//!
//! Read path: memory -> durable promotion -> coalesced fetch. Concurrent
//! misses for the same key serialize on a per-key lock, so one fetch
//! serves every waiter instead of stampeding the backend.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{DurationPolicy, EntryStore, MetricsRecorder, PerformanceMetrics};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::invalidation::{
    CacheUpdateNotification, ChangeFeed, DependencyGraph, InvalidationListener, PrewarmFuture,
    Prewarmer,
};
use crate::mirror::{DurableMirror, DurableStore, MemoryDurableStore};
use crate::tasks::{spawn_reconcile_task, spawn_resample_task};

// == Cache Manager ==
/// Multi-tier cache for scheduling data.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<RwLock<EntryStore>>,
    mirror: DurableMirror,
    policy: DurationPolicy,
    metrics: Arc<RwLock<MetricsRecorder>>,
    notifier: broadcast::Sender<CacheUpdateNotification>,
    fetch_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    prewarmers: Arc<RwLock<Vec<Prewarmer>>>,
    listener: InvalidationListener,
    config: Config,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager over the given durable backend and dependency
    /// graph.
    pub fn new(config: Config, durable: Arc<dyn DurableStore>, graph: DependencyGraph) -> Self {
        let store = Arc::new(RwLock::new(EntryStore::new()));
        let mirror = DurableMirror::new(durable, config.durable_namespace.clone());
        let policy = DurationPolicy::new();
        let (notifier, _) = broadcast::channel(config.broadcast_capacity);
        let prewarmers = Arc::new(RwLock::new(Vec::new()));

        let listener = InvalidationListener::new(
            store.clone(),
            mirror.clone(),
            Arc::new(graph),
            policy,
            notifier.clone(),
            prewarmers.clone(),
        );

        Self {
            store,
            mirror,
            policy,
            metrics: Arc::new(RwLock::new(MetricsRecorder::new())),
            notifier,
            fetch_locks: Arc::new(Mutex::new(HashMap::new())),
            prewarmers,
            listener,
            config,
        }
    }

    /// Convenience constructor: default config, in-memory durable store,
    /// built-in dependency graph.
    pub fn with_defaults() -> Self {
        Self::new(
            Config::default(),
            Arc::new(MemoryDurableStore::new()),
            DependencyGraph::default_graph(),
        )
    }

    // == Get Cached Data ==
    /// Returns the value for `key`, fetching it on a miss.
    ///
    /// Lookup order: in-memory entry store, then durable mirror (a hit
    /// there is promoted into memory), then the caller-supplied fetch.
    /// A successful fetch is stored in both tiers with the TTL from
    /// `ttl_override` or the duration policy. A failed fetch propagates
    /// to the caller, still counts as a miss, and writes nothing.
    ///
    /// # Arguments
    /// * `key` - The cache key
    /// * `fetcher` - Invoked on a miss to load the value
    /// * `ttl_override` - TTL in milliseconds, bypassing the policy
    /// * `dependencies` - Advisory dependent-key prefixes stored on the entry
    pub async fn get_cached_data<T, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl_override: Option<u64>,
        dependencies: Vec<String>,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let started = Instant::now();

        if let Some(data) = self.lookup(key).await {
            self.record_request(true, started).await;
            return serde_json::from_value(data).map_err(CacheError::Serialization);
        }

        // Miss: serialize concurrent fetches for this key
        let lock = self.fetch_lock(key).await;
        let result = {
            let _guard = lock.lock().await;

            // A waiter coalesced behind the winning fetch finds the key
            // populated once it acquires the lock
            if let Some(data) = self.lookup(key).await {
                self.record_request(true, started).await;
                serde_json::from_value(data).map_err(CacheError::Serialization)
            } else {
                match fetcher().await {
                    Ok(value) => {
                        let outcome = self
                            .store_fetched(key, &value, ttl_override, dependencies)
                            .await;
                        self.record_request(false, started).await;
                        outcome.map(|_| value)
                    }
                    Err(e) => {
                        self.record_request(false, started).await;
                        Err(CacheError::Fetch {
                            key: key.to_string(),
                            reason: e,
                        })
                    }
                }
            }
        };
        drop(lock);
        self.release_fetch_lock(key).await;
        result
    }

    /// Writes a freshly fetched value into both tiers.
    async fn store_fetched<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_override: Option<u64>,
        dependencies: Vec<String>,
    ) -> Result<()> {
        let data = serde_json::to_value(value)?;
        let ttl = ttl_override.unwrap_or_else(|| self.policy.resolve(key));
        let entry = self
            .store
            .write()
            .await
            .set(key.to_string(), data, ttl, dependencies);
        if let Err(e) = self.mirror.save(key, &entry) {
            warn!(key, error = %e, "durable mirror write failed");
        }
        Ok(())
    }

    /// Memory first, then durable promotion. Returns the raw cached
    /// value on a hit in either tier.
    async fn lookup(&self, key: &str) -> Option<Value> {
        {
            let mut store = self.store.write().await;
            if let Some(entry) = store.get(key) {
                return Some(entry.data.clone());
            }
        }

        // Promotion-on-read: a mirror hit moves into memory so later
        // reads skip the (de)serialization cost
        let entry = self.mirror.load(key)?;
        let mut promoted = entry.promoted();
        promoted.touch();
        let data = promoted.data.clone();
        self.store
            .write()
            .await
            .insert_entry(key.to_string(), promoted);
        Some(data)
    }

    // == Set Cache ==
    /// Stores a value directly, bypassing any fetch.
    pub async fn set_cache<T: Serialize>(
        &self,
        key: &str,
        data: T,
        ttl_ms: u64,
        dependencies: Vec<String>,
    ) -> Result<()> {
        let value = serde_json::to_value(&data)?;
        let entry = self
            .store
            .write()
            .await
            .set(key.to_string(), value, ttl_ms, dependencies);
        if let Err(e) = self.mirror.save(key, &entry) {
            warn!(key, error = %e, "durable mirror write failed");
        }
        Ok(())
    }

    // == Clear Operations ==
    /// Removes one key from both tiers.
    pub async fn clear_cache(&self, key: &str) -> bool {
        let removed = self.store.write().await.delete(key);
        self.mirror.remove(key);
        removed
    }

    /// Removes every key containing `pattern` from both tiers. An empty
    /// pattern removes nothing.
    pub async fn clear_cache_by_pattern(&self, pattern: &str) -> usize {
        let from_store = self.store.write().await.delete_matching(pattern);
        let from_mirror = self.mirror.remove_matching(pattern);
        from_store + from_mirror
    }

    /// Removes everything from both tiers.
    pub async fn clear_all_cache(&self) -> usize {
        let from_store = self.store.write().await.clear();
        let from_mirror = self.mirror.remove_all();
        from_store + from_mirror
    }

    // == Consistency ==
    /// Enumerates entries, classifying each as valid, expired, or
    /// inconsistent (expiry earlier than creation), and purges expired
    /// ones as a side effect.
    pub async fn validate_consistency(&self) -> ConsistencyReport {
        let mut store = self.store.write().await;

        let mut valid = 0;
        let mut expired = 0;
        let mut inconsistent = 0;
        for (_, entry) in store.iter() {
            if entry.expires_at < entry.timestamp {
                inconsistent += 1;
            } else if entry.is_expired() {
                expired += 1;
            } else {
                valid += 1;
            }
        }
        let total = store.len();
        let purged = store.cleanup_expired();

        info!(total, valid, expired, inconsistent, purged, "cache consistency check");

        ConsistencyReport {
            total_entries: total,
            valid_entries: valid,
            expired_entries: expired,
            inconsistent_entries: inconsistent,
            checked_at: Utc::now(),
        }
    }

    // == Metrics ==
    /// Point-in-time performance snapshot.
    pub async fn metrics(&self) -> PerformanceMetrics {
        self.metrics.read().await.snapshot()
    }

    // == Subscriptions ==
    /// Subscribes to local invalidation notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdateNotification> {
        self.notifier.subscribe()
    }

    // == Pre-warming ==
    /// Registers a high-traffic fetch re-run after critical-table
    /// changes.
    pub async fn register_prewarmer<F, Fut>(&self, key: impl Into<String>, fetch: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let fetch = Arc::new(move || -> PrewarmFuture { Box::pin(fetch()) });
        self.prewarmers.write().await.push(Prewarmer {
            key: key.into(),
            fetch,
        });
    }

    // == Introspection ==
    /// Whether an unexpired entry exists in memory, without touching
    /// access telemetry.
    pub async fn contains(&self, key: &str) -> bool {
        self.store.read().await.contains(key)
    }

    /// The shared invalidation listener, for driving events directly.
    pub fn listener(&self) -> &InvalidationListener {
        &self.listener
    }

    // == Start ==
    /// Spawns the live listener, the reconciliation poll and the metrics
    /// resample loop.
    pub fn start(&self, feed: Arc<dyn ChangeFeed>) -> CacheTasks {
        let listener = self.listener.clone().spawn(feed.clone());
        let reconcile =
            spawn_reconcile_task(self.listener.clone(), feed, self.config.reconcile_interval);
        let resample = spawn_resample_task(
            self.store.clone(),
            self.metrics.clone(),
            self.config.resample_interval,
        );
        CacheTasks {
            listener,
            reconcile,
            resample,
        }
    }

    // == Internals ==
    async fn record_request(&self, hit: bool, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.write().await.record_request(hit, elapsed_ms);
    }

    async fn fetch_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.fetch_locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the per-key lock once no other caller holds it. The
    /// registry lock serializes this against `fetch_lock`, so the count
    /// check cannot race a new clone.
    async fn release_fetch_lock(&self, key: &str) {
        let mut locks = self.fetch_locks.lock().await;
        if let Some(lock) = locks.get(key) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(key);
            }
        }
    }
}

// == Cache Tasks ==
/// Handles for the manager's background loops.
#[derive(Debug)]
pub struct CacheTasks {
    /// Live subscription loop
    pub listener: JoinHandle<()>,
    /// Missed-event reconciliation poll
    pub reconcile: JoinHandle<()>,
    /// Metrics gauge resampler
    pub resample: JoinHandle<()>,
}

impl CacheTasks {
    /// Aborts all background loops.
    pub fn abort_all(&self) {
        self.listener.abort();
        self.reconcile.abort();
        self.resample.abort();
    }
}

// == Consistency Report ==
/// Result of a [`CacheManager::validate_consistency`] pass.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    /// Entries enumerated, whatever their state
    pub total_entries: usize,
    /// Entries still valid
    pub valid_entries: usize,
    /// Entries past their expiry (purged by this pass)
    pub expired_entries: usize,
    /// Entries with self-contradictory metadata
    pub inconsistent_entries: usize,
    /// When the check ran
    pub checked_at: DateTime<Utc>,
}
