//! In-process metrics for the session pipeline.
//!
//! Counters and histograms live in a global registry; callers record into
//! them directly and the composition root logs a snapshot on shutdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A value that can go up or down.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Latency histogram with fixed millisecond buckets.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 30s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 30000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds. Values past the last bound land in it.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Records the time elapsed since `start`.
    pub fn observe_since(&self, start: std::time::Instant) {
        self.observe(start.elapsed().as_millis() as u64);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    // Closer
    pub protosessions_closed: Counter,
    pub hits_closed: Counter,
    pub close_failures: Counter,

    // Session pipeline
    pub sessions_written: Counter,
    pub sessions_split: Counter,
    pub sessions_filtered: Counter,
    pub sessions_broken: Counter,
    pub events_broken: Counter,
    pub events_filtered: Counter,

    // Warehouse
    pub rows_written: Counter,
    pub table_writes: Counter,
    pub table_write_errors: Counter,
    pub tables_created: Counter,
    pub columns_added: Counter,

    // Batching writer
    pub sessions_accepted: Counter,
    pub spool_appends: Counter,
    pub spool_flushes: Counter,
    pub spool_flush_errors: Counter,
    pub spool_files_dropped: Counter,

    // Latency histograms
    pub close_latency_ms: Histogram,
    pub write_latency_ms: Histogram,
    pub table_write_latency_ms: Histogram,
    pub spool_flush_latency_ms: Histogram,

    // Gauges
    pub buffered_sessions: Gauge,
    pub spool_files: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub protosessions_closed: u64,
    pub hits_closed: u64,
    pub close_failures: u64,
    pub sessions_written: u64,
    pub sessions_split: u64,
    pub sessions_filtered: u64,
    pub sessions_broken: u64,
    pub events_broken: u64,
    pub events_filtered: u64,
    pub rows_written: u64,
    pub table_writes: u64,
    pub table_write_errors: u64,
    pub sessions_accepted: u64,
    pub spool_appends: u64,
    pub spool_flushes: u64,
    pub spool_flush_errors: u64,
    pub spool_files_dropped: u64,
    pub close_latency_mean_ms: f64,
    pub write_latency_mean_ms: f64,
    pub table_write_latency_mean_ms: f64,
    pub spool_flush_latency_mean_ms: f64,
    pub buffered_sessions: u64,
    pub spool_files: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            protosessions_closed: self.protosessions_closed.get(),
            hits_closed: self.hits_closed.get(),
            close_failures: self.close_failures.get(),
            sessions_written: self.sessions_written.get(),
            sessions_split: self.sessions_split.get(),
            sessions_filtered: self.sessions_filtered.get(),
            sessions_broken: self.sessions_broken.get(),
            events_broken: self.events_broken.get(),
            events_filtered: self.events_filtered.get(),
            rows_written: self.rows_written.get(),
            table_writes: self.table_writes.get(),
            table_write_errors: self.table_write_errors.get(),
            sessions_accepted: self.sessions_accepted.get(),
            spool_appends: self.spool_appends.get(),
            spool_flushes: self.spool_flushes.get(),
            spool_flush_errors: self.spool_flush_errors.get(),
            spool_files_dropped: self.spool_files_dropped.get(),
            close_latency_mean_ms: self.close_latency_ms.mean(),
            write_latency_mean_ms: self.write_latency_ms.mean(),
            table_write_latency_mean_ms: self.table_write_latency_ms.mean(),
            spool_flush_latency_mean_ms: self.spool_flush_latency_ms.mean(),
            buffered_sessions: self.buffered_sessions.get(),
            spool_files: self.spool_files.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
