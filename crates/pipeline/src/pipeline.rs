//! Pipeline builder and control handle

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument};

use contracts::{PipelineSettings, PipelineState};

use crate::control::{ControlSenders, ControlSignal, StageControl, control_channels};
use crate::dispatcher::{Dispatcher, StageTask};
use crate::error::{BoxError, PipelineError};
use crate::handle::{StageHandle, StageShared};
use crate::metrics::{MetricsSnapshot, StageMetrics};
use crate::output::PipelineOutput;
use crate::stage::{StageWorker, Transform};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Label used in logs and metrics
    pub name: String,
    /// Capacity of the public output queue
    pub output_capacity: usize,
    /// Default capacity of a measurement outlet
    pub measurement_capacity: usize,
    /// How long `stop` waits for stage tasks before aborting them
    pub stop_grace_period: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            output_capacity: 100,
            measurement_capacity: 1024,
            stop_grace_period: Duration::from_secs(1),
        }
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            name: settings.name.clone(),
            output_capacity: settings.output_capacity,
            measurement_capacity: settings.measurement_capacity,
            stop_grace_period: Duration::from_millis(settings.stop_grace_ms),
        }
    }
}

struct PendingStage<T> {
    shared: Arc<StageShared<T>>,
    capacity: usize,
    transform: Transform<T>,
}

/// A pipeline under construction
///
/// Stages can only be added here; `start` consumes the builder, so the
/// topology of a running pipeline cannot change.
pub struct Pipeline<T> {
    config: PipelineConfig,
    stages: Vec<PendingStage<T>>,
}

impl<T: Clone + Send + 'static> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Pipeline<T> {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Append a stage with an infallible transform
    ///
    /// `capacity` is the size of the stage's inbound buffer (0 is treated
    /// as 1).
    pub fn add_stage<F>(&mut self, name: impl Into<String>, capacity: usize, f: F) -> StageHandle<T>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.push_stage(name.into(), capacity, Box::new(move |item| Ok(f(item))))
    }

    /// Append a stage whose transform may fail
    ///
    /// Items whose transform returns `Err` (or panics) are logged, counted
    /// and skipped.
    pub fn add_fallible_stage<F, E>(
        &mut self,
        name: impl Into<String>,
        capacity: usize,
        f: F,
    ) -> StageHandle<T>
    where
        F: Fn(T) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        self.push_stage(name.into(), capacity, Box::new(move |item| f(item).map_err(Into::into)))
    }

    fn push_stage(&mut self, name: String, capacity: usize, transform: Transform<T>) -> StageHandle<T> {
        debug!(pipeline = %self.config.name, stage = %name, capacity, "Adding stage");
        let shared = Arc::new(StageShared::new(name, self.config.measurement_capacity));
        self.stages.push(PendingStage {
            shared: Arc::clone(&shared),
            capacity: capacity.max(1),
            transform,
        });
        StageHandle::new(shared)
    }

    /// Wire the stages, spawn one task per stage plus the dispatcher
    ///
    /// Returns immediately. Must be called within a tokio runtime.
    #[instrument(
        name = "pipeline_start",
        skip(self, input),
        fields(pipeline = %self.config.name, stages = self.stages.len())
    )]
    pub fn start(
        self,
        input: mpsc::Receiver<T>,
    ) -> Result<(PipelineHandle, PipelineOutput<T>), PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }

        let Self { config, stages } = self;
        let (output_tx, output_rx) = mpsc::channel(config.output_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(PipelineState::Running);

        let mut metrics = Vec::with_capacity(stages.len());
        let mut tasks = Vec::with_capacity(stages.len());
        let mut downstream = output_tx;

        // wire back to front so each stage gets its successor's sender
        for stage in stages.into_iter().rev() {
            let (tx, inbound) = mpsc::channel(stage.capacity);
            let (control, control_rx) = StageControl::new();
            let name = stage.shared.name().to_string();
            metrics.push((name.clone(), Arc::clone(stage.shared.metrics())));

            let worker = StageWorker {
                shared: stage.shared,
                transform: stage.transform,
                inbound,
                outbound: downstream,
                control: control_rx,
            };
            tasks.push(StageTask {
                name,
                control,
                handle: tokio::spawn(worker.run()),
            });
            downstream = tx;
        }
        tasks.reverse();
        metrics.reverse();

        let (control_tx, control_rx) = control_channels();
        let dispatcher = Dispatcher {
            name: config.name.clone(),
            input,
            first: Some(downstream),
            control: control_rx,
            stages: tasks,
            state: state_tx,
            grace_period: config.stop_grace_period,
        };
        tokio::spawn(dispatcher.run());

        info!("Pipeline started");

        let handle = PipelineHandle {
            name: Arc::from(config.name.as_str()),
            control: control_tx,
            state: state_rx.clone(),
            stages: Arc::from(metrics),
        };
        Ok((handle, PipelineOutput::new(output_rx, state_rx)))
    }
}

/// Control handle of a started pipeline
///
/// Cheap to clone. Every control call waits until the dispatcher has
/// acted on it.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    name: Arc<str>,
    control: ControlSenders,
    state: watch::Receiver<PipelineState>,
    stages: Arc<[(String, Arc<StageMetrics>)]>,
}

impl PipelineHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Stop the pipeline
    ///
    /// When this returns `Ok`, every stage task has terminated and the
    /// output yields nothing more. Stopping twice is a protocol violation.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        self.request(ControlSignal::Stop).await
    }

    /// Pause the pipeline
    ///
    /// # Panics
    ///
    /// If the pipeline is not running; see [`PipelineHandle::try_pause`].
    pub async fn pause(&self) {
        if let Err(e) = self.try_pause().await {
            panic!("{e}");
        }
    }

    /// Pause the pipeline, or report why it cannot be paused
    pub async fn try_pause(&self) -> Result<(), PipelineError> {
        self.request(ControlSignal::Pause).await
    }

    /// Resume a paused pipeline; a no-op while running
    ///
    /// # Panics
    ///
    /// If the pipeline is stopped; see [`PipelineHandle::try_resume`].
    pub async fn resume(&self) {
        if let Err(e) = self.try_resume().await {
            panic!("{e}");
        }
    }

    /// Resume the pipeline, or report why it cannot be resumed
    pub async fn try_resume(&self) -> Result<(), PipelineError> {
        self.request(ControlSignal::Resume).await
    }

    /// Wait until the pipeline is stopped
    pub async fn wait_stopped(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| s.is_stopped()).await.map(|_| ());
    }

    /// Metrics of every stage, in pipeline order
    pub fn stage_metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.stages
            .iter()
            .map(|(name, metrics)| (name.clone(), metrics.snapshot()))
            .collect()
    }

    async fn request(&self, signal: ControlSignal) -> Result<(), PipelineError> {
        let state = self.state();
        if state.is_stopped() {
            return Err(PipelineError::protocol_violation(signal.operation(), state));
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control.get(signal).send(ack_tx).await.is_err() {
            return Err(self.unreachable(signal));
        }
        ack_rx.await.unwrap_or_else(|_| Err(self.unreachable(signal)))
    }

    /// Error for a request the dispatcher will never answer
    fn unreachable(&self, signal: ControlSignal) -> PipelineError {
        match self.state() {
            PipelineState::Stopped => {
                PipelineError::protocol_violation(signal.operation(), PipelineState::Stopped)
            }
            _ => PipelineError::DispatcherGone,
        }
    }
}
