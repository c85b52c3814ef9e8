//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{Operation, PipelineBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    pipeline: String,
    stage_count: usize,
    measured_count: usize,
    buffered_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    pipeline: blueprint.pipeline.name.clone(),
                    stage_count: blueprint.stages.len(),
                    measured_count: blueprint.measured_stages().count(),
                    buffered_capacity: blueprint.total_buffer_capacity(),
                    rate: blueprint
                        .input
                        .rate
                        .map(|r| format!("{} per {}ms", r.permits, r.period_ms)),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.measured_stages().next().is_none() {
        warnings.push("No measured stages - latency summaries will be empty".to_string());
    }

    for stage in &blueprint.stages {
        if matches!(stage.operation, Operation::Div(0) | Operation::Rem(0)) {
            warnings.push(format!(
                "Stage '{}' divides by zero - every item will be skipped",
                stage.name
            ));
        }
    }

    let mut names: Vec<&str> = blueprint.stages.iter().map(|s| s.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    if names.len() != blueprint.stages.len() {
        warnings.push("Stage names are not unique - metrics will be merged by name".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Pipeline: {}", summary.pipeline);
            println!("  Stages: {}", summary.stage_count);
            println!("  Measured stages: {}", summary.measured_count);
            println!("  Buffered capacity: {}", summary.buffered_capacity);
            if let Some(ref rate) = summary.rate {
                println!("  Input rate: {}", rate);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
