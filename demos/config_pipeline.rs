//! Config Pipeline Example
//!
//! Demonstrates reading a configuration file, building one stage per
//! configured operation, feeding integers and aggregating measurement
//! records of the measured stages.
//!
//! Run with: cargo run -p pipeline_demos --bin config_pipeline [config_path]

use std::path::PathBuf;
use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{MeasurementRecord, PipelineBlueprint};
use observability::StageLatencyAggregator;
use pipeline::{Pipeline, PipelineConfig, StageHandle};
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const ITEMS: i64 = 1_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Config Pipeline Demo");

    let config_path = resolve_config_path();
    info!(path = %config_path.display(), "Loading config file");
    let blueprint = ConfigLoader::load_from_path(config_path.as_path())?;
    info!(
        pipeline = %blueprint.pipeline.name,
        stages = blueprint.stages.len(),
        "Blueprint loaded"
    );

    // ==== Stage 1: Build the pipeline ====
    let (pipeline, stages) = build_pipeline(&blueprint);
    let records: Vec<mpsc::Receiver<MeasurementRecord<i64>>> = blueprint
        .stages
        .iter()
        .zip(&stages)
        .filter(|(config, _)| config.measure)
        .map(|(_, stage)| stage.enable_measurement())
        .collect();

    let aggregator = tokio::spawn(async move {
        let mut aggregator = StageLatencyAggregator::new();
        for mut rx in records {
            while let Some(record) = rx.recv().await {
                aggregator.update(&record);
            }
        }
        aggregator
    });

    // ==== Stage 2: Start and feed ====
    let (input_tx, input_rx) = mpsc::channel(blueprint.input.capacity);
    let (handle, mut output) = pipeline.start(input_rx)?;

    tokio::spawn(async move {
        for i in 0..ITEMS {
            if input_tx.send(i).await.is_err() {
                break;
            }
        }
    });

    // ==== Stage 3: Consume ====
    let consumer = tokio::spawn(async move {
        let mut count = 0u64;
        let mut last = None;
        while let Some(item) = output.recv().await {
            count += 1;
            last = Some(item);
        }
        (count, last)
    });

    let result = tokio::time::timeout(Duration::from_secs(10), consumer).await;

    // ==== Stage 4: Shutdown ====
    info!("Shutting down...");
    handle.stop().await?;
    for stage in &stages {
        stage.disable_measurement();
    }

    match result {
        Ok(Ok((count, last))) => info!(items = count, last = ?last, "Pipeline completed"),
        Ok(Err(e)) => info!("Consumer task error: {:?}", e),
        Err(_) => info!("Pipeline timed out"),
    }

    for (name, metrics) in handle.stage_metrics() {
        info!(
            stage = %name,
            processed = metrics.processed_count,
            failed = metrics.failure_count,
            mean_latency_us = metrics.mean_latency.as_micros() as u64,
            "Stage metrics"
        );
    }

    for summary in aggregator.await?.summary() {
        info!("{}", summary);
    }

    info!("Config Pipeline Demo finished");
    Ok(())
}

fn resolve_config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pipeline.toml"))
}

fn build_pipeline(blueprint: &PipelineBlueprint) -> (Pipeline<i64>, Vec<StageHandle<i64>>) {
    let mut pipeline = Pipeline::with_config(PipelineConfig::from(&blueprint.pipeline));
    let mut stages = Vec::with_capacity(blueprint.stages.len());

    for stage in &blueprint.stages {
        let operation = stage.operation;
        stages.push(pipeline.add_fallible_stage(
            &stage.name,
            stage.buffer_capacity,
            move |x| operation.apply(x),
        ));
    }

    (pipeline, stages)
}
