//! Metrics sink
//!
//! Counters, latency histogram, and percentile export for the read path.
//!
//! ## Responsibilities
//! - Atomic hit/miss/request counters
//! - Six-bucket latency histogram (<1ms .. >=100ms)
//! - Bounded ring of recent latency samples for percentile computation
//! - Batch-size accounting for the write batcher
//! - JSON snapshot for the STATS command
//!
//! One instance is constructed per engine and shared as `Arc<Metrics>` by
//! the store, the batcher, and the executor; tests build their own.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::LATENCY_SAMPLE_CAP;

// =============================================================================
// Latency Histogram
// =============================================================================

/// Fixed-bucket latency histogram plus a bounded sample ring.
///
/// Bucket boundaries: <1ms, <5ms, <10ms, <50ms, <100ms, >=100ms.
pub struct LatencyHistogram {
    bucket_1ms: AtomicU64,
    bucket_5ms: AtomicU64,
    bucket_10ms: AtomicU64,
    bucket_50ms: AtomicU64,
    bucket_100ms: AtomicU64,
    bucket_plus: AtomicU64,

    /// Most recent samples, oldest first. Guarded by its own lock, held
    /// only around push/evict/copy.
    samples: Mutex<VecDeque<u64>>,

    sample_cap: usize,
}

/// Bucket counts at a point in time
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BucketCounts {
    #[serde(rename = "<1ms")]
    pub under_1ms: u64,
    #[serde(rename = "<5ms")]
    pub under_5ms: u64,
    #[serde(rename = "<10ms")]
    pub under_10ms: u64,
    #[serde(rename = "<50ms")]
    pub under_50ms: u64,
    #[serde(rename = "<100ms")]
    pub under_100ms: u64,
    #[serde(rename = ">=100ms")]
    pub over_100ms: u64,
}

impl LatencyHistogram {
    fn new(sample_cap: usize) -> Self {
        Self {
            bucket_1ms: AtomicU64::new(0),
            bucket_5ms: AtomicU64::new(0),
            bucket_10ms: AtomicU64::new(0),
            bucket_50ms: AtomicU64::new(0),
            bucket_100ms: AtomicU64::new(0),
            bucket_plus: AtomicU64::new(0),
            samples: Mutex::new(VecDeque::with_capacity(sample_cap.min(1024))),
            sample_cap,
        }
    }

    /// Record one sample in microseconds
    pub fn record(&self, micros: u64) {
        let millis = micros / 1000;
        let bucket = if millis < 1 {
            &self.bucket_1ms
        } else if millis < 5 {
            &self.bucket_5ms
        } else if millis < 10 {
            &self.bucket_10ms
        } else if millis < 50 {
            &self.bucket_50ms
        } else if millis < 100 {
            &self.bucket_100ms
        } else {
            &self.bucket_plus
        };
        bucket.fetch_add(1, Ordering::Relaxed);

        let mut samples = self.samples.lock();
        samples.push_back(micros);
        if samples.len() > self.sample_cap {
            samples.pop_front();
        }
    }

    /// Percentile over the current samples, `p` in [0.0, 1.0].
    ///
    /// Copies the ring and sorts with the lock released. Index is
    /// `floor(p * n)` clamped to `n - 1`; returns 0 with no samples.
    pub fn percentile(&self, p: f64) -> u64 {
        let mut sorted: Vec<u64> = {
            let samples = self.samples.lock();
            samples.iter().copied().collect()
        };
        if sorted.is_empty() {
            return 0;
        }
        sorted.sort_unstable();

        let mut index = (p * sorted.len() as f64) as usize;
        if index >= sorted.len() {
            index = sorted.len() - 1;
        }
        sorted[index]
    }

    /// Current bucket counts
    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            under_1ms: self.bucket_1ms.load(Ordering::Relaxed),
            under_5ms: self.bucket_5ms.load(Ordering::Relaxed),
            under_10ms: self.bucket_10ms.load(Ordering::Relaxed),
            under_50ms: self.bucket_50ms.load(Ordering::Relaxed),
            under_100ms: self.bucket_100ms.load(Ordering::Relaxed),
            over_100ms: self.bucket_plus.load(Ordering::Relaxed),
        }
    }

    /// Number of samples currently held
    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Process metrics for the cache read path and the write batcher
pub struct Metrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_requests: AtomicU64,
    total_latency_us: AtomicU64,

    total_batches: AtomicU64,
    total_batched_writes: AtomicU64,

    histogram: LatencyHistogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::with_sample_cap(LATENCY_SAMPLE_CAP)
    }

    pub fn with_sample_cap(sample_cap: usize) -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            total_batches: AtomicU64::new(0),
            total_batched_writes: AtomicU64::new(0),
            histogram: LatencyHistogram::new(sample_cap),
        }
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one read-path latency sample in microseconds
    pub fn record_latency(&self, micros: u64) {
        self.total_latency_us.fetch_add(micros, Ordering::Relaxed);
        self.histogram.record(micros);
    }

    /// Record one drained batch of `size` writes
    pub fn record_batch(&self, size: usize) {
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        self.total_batched_writes
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_batches(&self) -> u64 {
        self.total_batches.load(Ordering::Relaxed)
    }

    pub fn histogram(&self) -> &LatencyHistogram {
        &self.histogram
    }

    /// Take a point-in-time snapshot of every exported metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = self.total_requests.load(Ordering::Relaxed);
        let latency = self.total_latency_us.load(Ordering::Relaxed);

        let hit_rate = if total > 0 {
            100.0 * hits as f64 / total as f64
        } else {
            0.0
        };
        let avg_latency_us = if total > 0 {
            latency as f64 / total as f64
        } else {
            0.0
        };

        let batches = self.total_batches.load(Ordering::Relaxed);
        let batched_writes = self.total_batched_writes.load(Ordering::Relaxed);
        let batch_avg_size = if batches > 0 {
            batched_writes as f64 / batches as f64
        } else {
            0.0
        };

        let buckets = self.histogram.counts();

        MetricsSnapshot {
            cache_hits: hits,
            cache_misses: misses,
            total_requests: total,
            hit_rate,
            avg_latency_us,
            p50_latency_us: self.histogram.percentile(0.50),
            p95_latency_us: self.histogram.percentile(0.95),
            p99_latency_us: self.histogram.percentile(0.99),
            p50_less_than_1ms: buckets.under_1ms,
            p99_tail_events: buckets.over_100ms,
            batch_avg_size,
            histogram: buckets,
        }
    }

    /// Snapshot rendered as a single JSON object
    pub fn to_json(&self) -> String {
        // Serialization of a plain struct with no map keys cannot fail
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the metrics, serialized for STATS
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_requests: u64,
    /// Percent of requests that hit, 0.0 when no requests yet
    pub hit_rate: f64,
    pub avg_latency_us: f64,
    pub p50_latency_us: u64,
    pub p95_latency_us: u64,
    pub p99_latency_us: u64,
    /// Count of sub-millisecond samples
    pub p50_less_than_1ms: u64,
    /// Count of samples at or past 100ms
    pub p99_tail_events: u64,
    pub batch_avg_size: f64,
    pub histogram: BucketCounts,
}
