//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{PipelineBlueprint, RateSettings};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::runner::{PausePlan, RunConfig, Runner};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let path = args.config_path.as_deref().unwrap_or(&args.config);
    info!(config = %path.display(), "Loading configuration");

    if args.config_path.is_none() && !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_with_override(
        &args.config,
        args.config_path.as_deref(),
        args.copy_sample,
    )
    .with_context(|| format!("Failed to load config from {}", path.display()))?;

    // Apply CLI overrides
    if let Some(rate) = args.rate {
        info!(rate, "Overriding input rate from CLI");
        blueprint.input.rate = (rate > 0).then_some(RateSettings {
            permits: rate,
            period_ms: 1000,
        });
    }

    info!(
        pipeline = %blueprint.pipeline.name,
        stages = blueprint.stages.len(),
        measured = blueprint.measured_stages().count(),
        buffered = blueprint.total_buffer_capacity(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let run_config = RunConfig {
        rate: blueprint.input.rate,
        blueprint,
        count: args.count,
        pause: args.pause_after.map(|after| PausePlan {
            after,
            duration: Duration::from_millis(args.pause_ms),
        }),
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
        print_items: args.print_items,
    };

    let runner = Runner::new(run_config);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        result = runner.run() => {
            match result {
                Ok(stats) => {
                    info!(
                        received = stats.received,
                        lost = stats.lost(),
                        duration_secs = stats.duration.as_secs_f64(),
                        throughput = format!("{:.2}", stats.throughput()),
                        "Pipeline completed successfully"
                    );

                    stats.print_summary();
                }
                Err(e) => {
                    return Err(e).context("Pipeline execution failed");
                }
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("Pipeline runner finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Pipeline: {}", blueprint.pipeline.name);
    println!("  Output capacity: {}", blueprint.pipeline.output_capacity);
    println!(
        "  Measurement capacity: {}",
        blueprint.pipeline.measurement_capacity
    );
    println!("  Stop grace period: {}ms", blueprint.pipeline.stop_grace_ms);

    println!("\nInput:");
    println!("  Capacity: {}", blueprint.input.capacity);
    match blueprint.input.rate {
        Some(rate) => println!("  Rate: {} per {}ms", rate.permits, rate.period_ms),
        None => println!("  Rate: unlimited"),
    }

    println!("\nStages ({}):", blueprint.stages.len());
    for stage in &blueprint.stages {
        println!(
            "  - {} [{}] buffer={}{}",
            stage.name,
            stage.operation,
            stage.buffer_capacity,
            if stage.measure { " (measured)" } else { "" }
        );
    }

    println!();
}
