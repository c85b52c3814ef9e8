//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    pipeline: PipelineInfo,
    input: InputInfo,
    stages: Vec<StageInfo>,
}

#[derive(Serialize)]
struct PipelineInfo {
    name: String,
    output_capacity: usize,
    measurement_capacity: usize,
    stop_grace_ms: u64,
    total_buffer_capacity: usize,
}

#[derive(Serialize)]
struct InputInfo {
    capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_permits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_period_ms: Option<u64>,
}

#[derive(Serialize)]
struct StageInfo {
    name: String,
    operation: String,
    fallible: bool,
    buffer_capacity: usize,
    measure: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else if args.normalized {
        let toml = config_loader::ConfigLoader::to_toml(&blueprint)
            .context("Failed to serialize normalized config")?;
        print!("{}", toml);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &PipelineBlueprint) -> ConfigInfo {
    let stages = blueprint
        .stages
        .iter()
        .map(|s| StageInfo {
            name: s.name.clone(),
            operation: s.operation.to_string(),
            fallible: s.operation.is_fallible(),
            buffer_capacity: s.buffer_capacity,
            measure: s.measure,
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        pipeline: PipelineInfo {
            name: blueprint.pipeline.name.clone(),
            output_capacity: blueprint.pipeline.output_capacity,
            measurement_capacity: blueprint.pipeline.measurement_capacity,
            stop_grace_ms: blueprint.pipeline.stop_grace_ms,
            total_buffer_capacity: blueprint.total_buffer_capacity(),
        },
        input: InputInfo {
            capacity: blueprint.input.capacity,
            rate_permits: blueprint.input.rate.map(|r| r.permits),
            rate_period_ms: blueprint.input.rate.map(|r| r.period_ms),
        },
        stages,
    }
}

fn print_config_info(blueprint: &PipelineBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Pipeline Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let settings = &blueprint.pipeline;
    println!("⚙️  Pipeline");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Name: {}", settings.name);
    println!("   ├─ Output capacity: {}", settings.output_capacity);
    println!("   ├─ Measurement capacity: {}", settings.measurement_capacity);
    println!("   ├─ Stop grace period: {}ms", settings.stop_grace_ms);
    println!(
        "   └─ Total buffered capacity: {}",
        blueprint.total_buffer_capacity()
    );

    println!("\n📥 Input");
    println!("   ├─ Capacity: {}", blueprint.input.capacity);
    match blueprint.input.rate {
        Some(rate) => println!("   └─ Rate: {} per {}ms", rate.permits, rate.period_ms),
        None => println!("   └─ Rate: unlimited"),
    }

    println!("\n🔗 Stages ({})", blueprint.stages.len());
    for (i, stage) in blueprint.stages.iter().enumerate() {
        let is_last = i == blueprint.stages.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, stage.name, stage.operation);
        println!(
            "   {}  └─ buffer={}, fallible={}, measured={}",
            child_prefix,
            stage.buffer_capacity,
            stage.operation.is_fallible(),
            stage.measure
        );
    }

    println!();
}
