//! Text Pipeline Example
//!
//! A pipeline over `String` items: normalize, parse and format stages, with
//! a fallible stage whose rejected items are skipped. Shows pausing,
//! resuming and stopping a running pipeline from another task.
//!
//! Run with: cargo run -p pipeline_demos --bin text_pipeline

use std::time::Duration;

use pipeline::{Pipeline, PipelineConfig};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug)]
struct ParseError(String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not a number: {:?}", self.0)
    }
}

impl std::error::Error for ParseError {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting Text Pipeline Demo");

    let mut pipeline = Pipeline::with_config(PipelineConfig {
        name: "text".to_string(),
        output_capacity: 4,
        ..Default::default()
    });

    pipeline.add_stage("trim", 4, |s: String| s.trim().to_lowercase());
    pipeline.add_fallible_stage("square", 4, |s: String| {
        let n: i64 = s.parse().map_err(|_| ParseError(s.clone()))?;
        Ok::<_, ParseError>(n.saturating_mul(n).to_string())
    });
    let format = pipeline.add_stage("format", 4, |s: String| format!("<{s}>"));
    let mut records = format.enable_measurement();

    let (tx, rx) = mpsc::channel(4);
    let (handle, mut output) = pipeline.start(rx)?;

    // ==== Producer: words, some of which are rejected ====
    tokio::spawn(async move {
        let words = ["  1", "2 ", "three", "4", "FIVE", "6", "7", "8", "nine", "10"];
        for word in words.iter().cycle() {
            if tx.send(word.to_string()).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    // ==== Controller: pause for a while, then stop ====
    let controller = {
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.pause().await;
            info!(state = %handle.state(), "Paused");

            tokio::time::sleep(Duration::from_millis(300)).await;
            handle.resume().await;
            info!(state = %handle.state(), "Resumed");

            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.stop().await
        })
    };

    let mut received = 0usize;
    while let Some(item) = output.recv().await {
        received += 1;
        info!(item = %item, "Output");
    }

    controller.await??;
    format.disable_measurement();

    let mut measured = 0usize;
    while let Some(record) = records.recv().await {
        measured += 1;
        if measured % 10 == 0 {
            info!(
                stage = %record.stage_name,
                count = record.processed_count,
                elapsed_ms = format!("{:.3}", record.elapsed_ms()),
                "Measurement"
            );
        }
    }

    for (name, metrics) in handle.stage_metrics() {
        info!(
            stage = %name,
            processed = metrics.processed_count,
            failed = metrics.failure_count,
            "Stage metrics"
        );
    }

    info!(received, measured, "Text Pipeline Demo finished");
    Ok(())
}
