//! Configuration Module
//!
//! Handles loading and managing cache manager configuration from
//! environment variables.

use std::env;

/// Cache manager configuration parameters.
///
/// All values can be configured via environment variables with sensible
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Missed-event reconciliation poll interval in seconds
    pub reconcile_interval: u64,
    /// Metrics size/memory resample interval in seconds
    pub resample_interval: u64,
    /// Namespace prefix for durable mirror records
    pub durable_namespace: String,
    /// Capacity of the local invalidation broadcast channel
    pub broadcast_capacity: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `RECONCILE_INTERVAL` - Reconciliation poll frequency in seconds (default: 30)
    /// - `RESAMPLE_INTERVAL` - Metrics resample frequency in seconds (default: 60)
    /// - `DURABLE_NAMESPACE` - Durable record namespace (default: "sched_cache")
    /// - `BROADCAST_CAPACITY` - Invalidation broadcast buffer size (default: 64)
    pub fn from_env() -> Self {
        Self {
            reconcile_interval: env::var("RECONCILE_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            resample_interval: env::var("RESAMPLE_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            durable_namespace: env::var("DURABLE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "sched_cache".to_string()),
            broadcast_capacity: env::var("BROADCAST_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconcile_interval: 30,
            resample_interval: 60,
            durable_namespace: "sched_cache".to_string(),
            broadcast_capacity: 64,
        }
    }
}
