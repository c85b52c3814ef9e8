//! Pipeline metric helpers
//!
//! Thin wrappers over the `metrics` facade plus an in-memory aggregator
//! for measurement records. Without an installed recorder the facade
//! calls are no-ops, so the pipeline records unconditionally.

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{MeasurementRecord, PipelineState};
use metrics::{counter, gauge, histogram};

/// Record one item processed by a stage
pub fn record_stage_processed(stage: &str, elapsed: Duration) {
    counter!("pipeline_stage_processed_total", "stage" => stage.to_string()).increment(1);
    histogram!("pipeline_stage_latency_ms", "stage" => stage.to_string())
        .record(elapsed.as_secs_f64() * 1000.0);
}

/// Record a transform failure (item skipped)
pub fn record_stage_failure(stage: &str) {
    counter!("pipeline_stage_failures_total", "stage" => stage.to_string()).increment(1);
}

/// Record a measurement record dropped because its outlet was full
pub fn record_measurement_dropped(stage: &str) {
    counter!(
        "pipeline_measurements_dropped_total",
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Record one item forwarded by the dispatcher into the first stage
pub fn record_item_dispatched(pipeline: &str) {
    counter!(
        "pipeline_items_dispatched_total",
        "pipeline" => pipeline.to_string()
    )
    .increment(1);
}

/// Record a pipeline state transition
pub fn record_pipeline_state(pipeline: &str, state: PipelineState) {
    gauge!("pipeline_state", "pipeline" => pipeline.to_string()).set(state.as_gauge());
    counter!(
        "pipeline_state_transitions_total",
        "pipeline" => pipeline.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// Per-stage latency aggregator
///
/// Folds `MeasurementRecord`s into running statistics keyed by stage name.
#[derive(Debug, Clone, Default)]
pub struct StageLatencyAggregator {
    stages: BTreeMap<String, StageAccumulator>,
}

#[derive(Debug, Clone, Default)]
struct StageAccumulator {
    latency_ms: RunningStats,
    last_processed: u64,
}

impl StageLatencyAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record
    pub fn update<T>(&mut self, record: &MeasurementRecord<T>) {
        let acc = self.stages.entry(record.stage_name.clone()).or_default();
        acc.latency_ms.push(record.elapsed_ms());
        acc.last_processed = acc.last_processed.max(record.processed_count);
    }

    /// Number of stages seen
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Summary per stage, ordered by stage name
    pub fn summary(&self) -> Vec<StageSummary> {
        self.stages
            .iter()
            .map(|(name, acc)| StageSummary {
                stage_name: name.clone(),
                processed: acc.last_processed,
                latency_ms: StatsSummary::from(&acc.latency_ms),
            })
            .collect()
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        self.stages.clear();
    }
}

/// Latency summary of one stage
#[derive(Debug, Clone, Default)]
pub struct StageSummary {
    pub stage_name: String,
    pub processed: u64,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for StageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: processed={}, latency_ms: {}",
            self.stage_name, self.processed, self.latency_ms
        )
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
