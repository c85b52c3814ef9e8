//! MeasurementRecord - per-item stage instrumentation

use std::time::Duration;

/// One record per item processed by a stage with measurement enabled
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord<T> {
    /// Name of the emitting stage
    pub stage_name: String,

    /// Items processed by the stage so far, including this one
    pub processed_count: u64,

    /// Transformed value
    pub result: T,

    /// Wall-clock duration of the transform call
    pub elapsed: Duration,
}

impl<T> MeasurementRecord<T> {
    /// Elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
