//! Runner - builds a pipeline from a blueprint and drives it.
//!
//! Feeds `0..count` into the pipeline (optionally rate limited), consumes
//! the output, optionally runs one pause/resume cycle, then stops the
//! pipeline and collects statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use concurrent::{AtomicCounter, ConcurrentError, Counter, RateLimiter};
use contracts::{MeasurementRecord, Operation, PipelineBlueprint, RateSettings};
use observability::{StageLatencyAggregator, StageSummary};
use pipeline::{Pipeline, PipelineConfig, PipelineHandle, PipelineOutput, StageHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::RunStats;
use crate::error::{CliError, Result};

/// Pause once `after` outputs were received, for `duration`
#[derive(Debug, Clone, Copy)]
pub struct PausePlan {
    pub after: u64,
    pub duration: Duration,
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The pipeline blueprint
    pub blueprint: PipelineBlueprint,

    /// Number of input items (0..count)
    pub count: u64,

    /// Input rate limit (None = as fast as the pipeline accepts)
    pub rate: Option<RateSettings>,

    /// Optional pause/resume cycle
    pub pause: Option<PausePlan>,

    /// Run timeout (None = run until the input is exhausted)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Print every output item to stdout
    pub print_items: bool,
}

/// Main pipeline runner
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    #[instrument(
        name = "runner_run",
        skip(self),
        fields(pipeline = %self.config.blueprint.pipeline.name, count = self.config.count)
    )]
    pub async fn run(self) -> Result<RunStats> {
        let start_time = Instant::now();
        let config = &self.config;

        if let Some(port) = config.metrics_port {
            observability::init_metrics_only(port).map_err(|e| CliError::metrics(e.to_string()))?;
            info!("Metrics endpoint available on port {}", port);
        }

        let limiter = match config.rate {
            Some(rate) => {
                info!(
                    permits = rate.permits,
                    period_ms = rate.period_ms,
                    "Rate limiting input"
                );
                let limiter =
                    RateLimiter::new(rate.permits, Duration::from_millis(rate.period_ms))?;
                Some(Arc::new(limiter))
            }
            None => None,
        };

        let (pipeline, stages, records) = build_pipeline(&config.blueprint);
        let aggregators: Vec<_> = records.into_iter().map(spawn_aggregator).collect();

        let (input_tx, input_rx) = mpsc::channel(config.blueprint.input.capacity);
        let (handle, mut output) = pipeline.start(input_rx)?;

        let fed = Arc::new(AtomicCounter::new());
        let feeder = tokio::spawn(feed(
            input_tx,
            config.count,
            limiter.clone(),
            Arc::clone(&fed),
        ));

        let mut consumer = Consumer::new(&config.blueprint, config.print_items);
        let consume = consumer.consume(&mut output, &handle, config.pause);
        let timed_out = match config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, consume).await {
                Ok(result) => {
                    result?;
                    false
                }
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                    true
                }
            },
            None => {
                consume.await?;
                false
            }
        };

        info!("Stopping pipeline...");
        handle.stop().await?;

        if let Some(limiter) = &limiter {
            limiter.shutdown();
        }
        finish_feeder(feeder).await;

        // dropping the outlets ends the aggregator tasks
        for stage in &stages {
            stage.disable_measurement();
        }
        let mut latency = Vec::new();
        for aggregator in aggregators {
            match aggregator.await {
                Ok(summary) => latency.extend(summary),
                Err(e) => warn!(error = %e, "Measurement aggregator failed"),
            }
        }

        let stage_metrics = handle.stage_metrics();
        let stats = RunStats {
            fed: counter_value(fed.as_ref()),
            received: counter_value(&consumer.received),
            mismatches: consumer.mismatches,
            failures: stage_metrics.iter().map(|(_, m)| m.failure_count).sum(),
            last_output: consumer.last_output,
            paused: consumer.paused,
            timed_out,
            duration: start_time.elapsed(),
            stages: stage_metrics,
            latency,
        };

        info!(
            fed = stats.fed,
            received = stats.received,
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline run complete"
        );

        Ok(stats)
    }
}

/// Build a `Pipeline<i64>` with one stage per configured operation
///
/// Returns the stage handles in pipeline order and the measurement
/// receivers of stages configured with `measure = true`.
fn build_pipeline(
    blueprint: &PipelineBlueprint,
) -> (
    Pipeline<i64>,
    Vec<StageHandle<i64>>,
    Vec<mpsc::Receiver<MeasurementRecord<i64>>>,
) {
    let mut pipeline = Pipeline::with_config(PipelineConfig::from(&blueprint.pipeline));
    let mut handles = Vec::with_capacity(blueprint.stages.len());
    let mut records = Vec::new();

    for stage in &blueprint.stages {
        let operation = stage.operation;
        let handle = pipeline.add_fallible_stage(&stage.name, stage.buffer_capacity, move |x| {
            operation.apply(x)
        });
        if stage.measure {
            records.push(handle.enable_measurement());
        }
        debug!(stage = %stage.name, operation = %operation, measure = stage.measure, "Stage configured");
        handles.push(handle);
    }

    (pipeline, handles, records)
}

fn spawn_aggregator(
    mut records: mpsc::Receiver<MeasurementRecord<i64>>,
) -> JoinHandle<Vec<StageSummary>> {
    tokio::spawn(async move {
        let mut aggregator = StageLatencyAggregator::new();
        while let Some(record) = records.recv().await {
            aggregator.update(&record);
        }
        aggregator.summary()
    })
}

/// Feed `0..count` into the pipeline input
async fn feed(
    tx: mpsc::Sender<i64>,
    count: u64,
    limiter: Option<Arc<RateLimiter>>,
    fed: Arc<AtomicCounter>,
) -> Result<()> {
    for item in 0..count {
        if let Some(limiter) = &limiter {
            limiter.acquire().await?;
        }
        let Ok(value) = i64::try_from(item) else {
            break;
        };
        if tx.send(value).await.is_err() {
            debug!(fed = fed.value(), "Pipeline input closed");
            break;
        }
        fed.increment();
    }
    debug!(fed = fed.value(), "Feeder finished");
    Ok(())
}

async fn finish_feeder(feeder: JoinHandle<Result<()>>) {
    match feeder.await {
        Ok(Ok(())) => {}
        // the limiter was shut down while the feeder waited for a permit
        Ok(Err(CliError::Feeder(ConcurrentError::Shutdown))) => {
            debug!("Feeder interrupted by limiter shutdown");
        }
        Ok(Err(e)) => warn!(error = %e, "Feeder failed"),
        Err(e) => warn!(error = %e, "Feeder task panicked"),
    }
}

/// Output side of a run
struct Consumer {
    operations: Vec<Operation>,
    next_input: i64,
    received: AtomicCounter,
    mismatches: u64,
    last_output: Option<i64>,
    paused: bool,
    print_items: bool,
}

impl Consumer {
    fn new(blueprint: &PipelineBlueprint, print_items: bool) -> Self {
        Self {
            operations: blueprint.stages.iter().map(|s| s.operation).collect(),
            next_input: 0,
            received: AtomicCounter::new(),
            mismatches: 0,
            last_output: None,
            paused: false,
            print_items,
        }
    }

    /// Read until the output ends, pausing once if requested
    async fn consume(
        &mut self,
        output: &mut PipelineOutput<i64>,
        handle: &PipelineHandle,
        pause: Option<PausePlan>,
    ) -> Result<()> {
        while let Some(value) = output.recv().await {
            self.received.increment();
            self.check(value);
            if self.print_items {
                println!("{value}");
            }

            if let Some(plan) = pause {
                if !self.paused && counter_value(&self.received) >= plan.after {
                    self.paused = true;
                    info!(after = plan.after, pause_ms = plan.duration.as_millis() as u64, "Pausing pipeline");
                    handle.try_pause().await?;
                    tokio::time::sleep(plan.duration).await;
                    handle.try_resume().await?;
                    info!("Pipeline resumed");
                }
            }
        }
        Ok(())
    }

    /// Compare against the next input whose whole operation chain succeeds
    fn check(&mut self, value: i64) {
        let expected = loop {
            let input = self.next_input;
            self.next_input += 1;
            let result = self
                .operations
                .iter()
                .try_fold(input, |acc, op| op.apply(acc));
            if let Ok(expected) = result {
                break expected;
            }
        };

        if expected != value {
            self.mismatches += 1;
            warn!(expected, actual = value, "Unexpected output");
        }
        self.last_output = Some(value);
    }
}

fn counter_value(counter: &dyn Counter) -> u64 {
    u64::try_from(counter.value()).unwrap_or(0)
}
