//! StageHandle - observes a stage and toggles its measurement outlet

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use contracts::MeasurementRecord;

use crate::metrics::{MetricsSnapshot, StageMetrics};

type Outlet<T> = mpsc::Sender<MeasurementRecord<T>>;

/// State shared by a stage task and its handles
#[derive(Debug)]
pub(crate) struct StageShared<T> {
    name: String,
    metrics: Arc<StageMetrics>,
    /// Locked only to clone or replace the sender, never across an await
    outlet: Mutex<Option<Outlet<T>>>,
    measurement_capacity: usize,
}

impl<T: Clone> StageShared<T> {
    pub(crate) fn new(name: String, measurement_capacity: usize) -> Self {
        Self {
            name,
            metrics: Arc::new(StageMetrics::new()),
            outlet: Mutex::new(None),
            measurement_capacity: measurement_capacity.max(1),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn metrics(&self) -> &Arc<StageMetrics> {
        &self.metrics
    }

    fn outlet(&self) -> MutexGuard<'_, Option<Outlet<T>>> {
        self.outlet.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit a record if measurement is enabled
    ///
    /// Never waits: a full outlet drops the record and counts it.
    pub(crate) fn emit(&self, processed_count: u64, result: &T, elapsed: Duration) {
        let Some(outlet) = self.outlet().clone() else {
            return;
        };

        let record = MeasurementRecord {
            stage_name: self.name.clone(),
            processed_count,
            result: result.clone(),
            elapsed,
        };

        match outlet.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.metrics.inc_dropped_measurements();
                observability::record_measurement_dropped(&self.name);
                debug!(
                    stage = %self.name,
                    processed_count = record.processed_count,
                    "Measurement outlet full, record dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // reader went away; disable unless it was already replaced
                let mut current = self.outlet();
                if current.as_ref().is_some_and(|tx| tx.same_channel(&outlet)) {
                    *current = None;
                    warn!(stage = %self.name, "Measurement reader dropped, measurement disabled");
                }
            }
        }
    }
}

/// Handle to a stage, returned when the stage is added
///
/// Usable before and after `start`, from any task.
#[derive(Debug)]
pub struct StageHandle<T> {
    shared: Arc<StageShared<T>>,
}

impl<T> Clone for StageHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> StageHandle<T> {
    pub(crate) fn new(shared: Arc<StageShared<T>>) -> Self {
        Self { shared }
    }

    /// Get stage name
    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Get current metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics().snapshot()
    }

    /// Start emitting one record per processed item
    ///
    /// Uses the pipeline's measurement capacity. Replaces any previous
    /// outlet; its reader sees the end of the stream once drained.
    ///
    /// Delivery is lossy: the stage never waits on the reader, so once the
    /// outlet holds `capacity` unread records further records are dropped
    /// and counted in `dropped_measurements`. One record per item holds only
    /// while the reader keeps up.
    pub fn enable_measurement(&self) -> mpsc::Receiver<MeasurementRecord<T>> {
        self.enable_measurement_with_capacity(self.shared.measurement_capacity)
    }

    /// Like [`StageHandle::enable_measurement`] with an explicit capacity
    pub fn enable_measurement_with_capacity(
        &self,
        capacity: usize,
    ) -> mpsc::Receiver<MeasurementRecord<T>> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        *self.shared.outlet() = Some(tx);
        debug!(stage = %self.shared.name(), capacity, "Measurement enabled");
        rx
    }

    /// Stop emitting records; the current reader sees the end of the stream
    pub fn disable_measurement(&self) {
        if self.shared.outlet().take().is_some() {
            debug!(stage = %self.shared.name(), "Measurement disabled");
        }
    }

    pub fn is_measuring(&self) -> bool {
        self.shared.outlet().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(capacity: usize) -> StageHandle<i64> {
        StageHandle::new(Arc::new(StageShared::new("s".to_string(), capacity)))
    }

    #[test]
    fn test_emit_without_measurement_is_noop() {
        let handle = handle(4);
        handle.shared.emit(1, &10, Duration::from_micros(5));
        assert!(!handle.is_measuring());
        assert_eq!(handle.metrics().dropped_measurements, 0);
    }

    #[test]
    fn test_enable_disable() {
        let handle = handle(4);
        let mut rx = handle.enable_measurement();
        assert!(handle.is_measuring());

        handle.shared.emit(1, &10, Duration::from_micros(5));
        let record = rx.try_recv().unwrap();
        assert_eq!(record.stage_name, "s");
        assert_eq!(record.processed_count, 1);
        assert_eq!(record.result, 10);

        handle.disable_measurement();
        assert!(!handle.is_measuring());
        // sender dropped, stream ends
        assert_eq!(
            rx.try_recv().unwrap_err(),
            mpsc::error::TryRecvError::Disconnected
        );
    }

    #[test]
    fn test_full_outlet_drops_and_counts() {
        let handle = handle(4);
        let mut rx = handle.enable_measurement_with_capacity(2);

        for count in 1..=5 {
            handle.shared.emit(count, &0, Duration::ZERO);
        }

        assert_eq!(handle.metrics().dropped_measurements, 3);
        assert_eq!(rx.try_recv().unwrap().processed_count, 1);
        assert_eq!(rx.try_recv().unwrap().processed_count, 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_reader_disables_measurement() {
        let handle = handle(4);
        let rx = handle.enable_measurement();
        drop(rx);

        handle.shared.emit(1, &0, Duration::ZERO);
        assert!(!handle.is_measuring());
    }
}
