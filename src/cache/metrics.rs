//! Performance Metrics Module
//!
//! Tracks cache performance: hit/miss counts with derived rates, a
//! running mean of response times, and timer-resampled size and memory
//! gauges. No per-sample history is retained; the mean is maintained
//! incrementally so memory stays bounded regardless of request volume.

use serde::Serialize;

// == Metrics Recorder ==
/// Mutable metrics state owned by the cache manager.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    /// Number of requests served from cache (memory or durable mirror)
    hits: u64,
    /// Number of requests that went to the fetch function
    misses: u64,
    /// Running mean of request latency in milliseconds
    average_response_ms: f64,
    /// Entry count at the last resample
    cache_size: usize,
    /// Serialized-length memory estimate at the last resample
    memory_usage_bytes: usize,
}

impl MetricsRecorder {
    // == Constructor ==
    /// Creates a new recorder with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Request ==
    /// Records one request outcome and its latency.
    ///
    /// The running mean uses the standard incremental update
    /// `avg += (sample - avg) / n`, never a recomputation from history.
    ///
    /// # Arguments
    /// * `hit` - Whether the request was served from cache
    /// * `elapsed_ms` - Request latency in milliseconds
    pub fn record_request(&mut self, hit: bool, elapsed_ms: f64) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        let n = self.total_requests() as f64;
        self.average_response_ms += (elapsed_ms - self.average_response_ms) / n;
    }

    // == Resample ==
    /// Updates the size and memory gauges. Called on a fixed timer rather
    /// than on every mutation, trading precision for reduced overhead.
    pub fn resample(&mut self, cache_size: usize, memory_usage_bytes: usize) {
        self.cache_size = cache_size;
        self.memory_usage_bytes = memory_usage_bytes;
    }

    // == Total Requests ==
    /// Total requests observed, hits plus misses.
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    // == Hit Rate ==
    /// Fraction of requests served from cache, 0.0 before any request.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Miss Rate ==
    /// Fraction of requests that went to the fetch function.
    pub fn miss_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.misses as f64 / total as f64
        }
    }

    // == Snapshot ==
    /// Produces an immutable snapshot for consumers.
    pub fn snapshot(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            hit_rate: self.hit_rate(),
            miss_rate: self.miss_rate(),
            average_response_ms: self.average_response_ms,
            total_requests: self.total_requests(),
            cache_size: self.cache_size,
            memory_usage_bytes: self.memory_usage_bytes,
        }
    }
}

// == Performance Metrics Snapshot ==
/// Point-in-time view of cache performance.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    /// Fraction of requests served from cache
    pub hit_rate: f64,
    /// Fraction of requests that invoked the fetch function
    pub miss_rate: f64,
    /// Running mean request latency in milliseconds
    pub average_response_ms: f64,
    /// Total requests observed
    pub total_requests: u64,
    /// Entry count at the last resample
    pub cache_size: usize,
    /// Rough memory estimate at the last resample, in bytes
    pub memory_usage_bytes: usize,
}
