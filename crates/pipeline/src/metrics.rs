//! Stage metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics for a single stage
///
/// Written only by the stage's own task; read from anywhere.
#[derive(Debug, Default)]
pub struct StageMetrics {
    /// Items transformed successfully
    processed_count: AtomicU64,
    /// Items dropped because the transform failed
    failure_count: AtomicU64,
    /// Measurement records dropped because the outlet was full
    dropped_measurements: AtomicU64,
    /// Sum of transform durations, microseconds
    total_latency_us: AtomicU64,
    /// Duration of the most recent transform, microseconds
    last_latency_us: AtomicU64,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    /// Record one successful transform
    pub fn record_processed(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.processed_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(micros, Ordering::Relaxed);
        self.last_latency_us.store(micros, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_measurements(&self) -> u64 {
        self.dropped_measurements.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_measurements(&self) {
        self.dropped_measurements.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean transform duration
    pub fn mean_latency(&self) -> Duration {
        let processed = self.processed_count();
        if processed == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_latency_us.load(Ordering::Relaxed) / processed)
    }

    pub fn last_latency(&self) -> Duration {
        Duration::from_micros(self.last_latency_us.load(Ordering::Relaxed))
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed_count: self.processed_count(),
            failure_count: self.failure_count(),
            dropped_measurements: self.dropped_measurements(),
            mean_latency: self.mean_latency(),
            last_latency: self.last_latency(),
        }
    }
}

/// Snapshot of stage metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub processed_count: u64,
    pub failure_count: u64,
    pub dropped_measurements: u64,
    pub mean_latency: Duration,
    pub last_latency: Duration,
}
