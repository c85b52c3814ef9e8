//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pipeline Runner - drive a configured multi-stage pipeline
#[derive(Parser, Debug)]
#[command(
    name = "pipeline-runner",
    author,
    version,
    about = "Multi-stage concurrent pipeline runner",
    long_about = "Builds a multi-stage processing pipeline from a configuration file,\n\
                  feeds it a sequence of integers and reports per-stage throughput\n\
                  and latency. Supports pausing, resuming and stopping at runtime."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "PIPELINE_RUNNER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "PIPELINE_RUNNER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Also write plain-text logs into this directory
    #[arg(long, global = true, env = "PIPELINE_RUNNER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Append the process id to the log file name
    #[arg(long, global = true, requires = "log_dir")]
    pub log_pid: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); the sample for --config-path
    #[arg(
        short,
        long,
        default_value = "pipeline.toml",
        env = "PIPELINE_RUNNER_CONFIG"
    )]
    pub config: PathBuf,

    /// Load this configuration instead of --config
    #[arg(long, env = "PIPELINE_RUNNER_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Create --config-path from --config when it does not exist
    #[arg(long, requires = "config_path")]
    pub copy_sample: bool,

    /// Number of items to feed (0..count)
    #[arg(long, default_value = "100", env = "PIPELINE_RUNNER_COUNT")]
    pub count: u64,

    /// Feed at most this many items per second (overrides the configuration)
    #[arg(long, env = "PIPELINE_RUNNER_RATE")]
    pub rate: Option<u32>,

    /// Pause the pipeline once this many outputs were received
    #[arg(long)]
    pub pause_after: Option<u64>,

    /// How long to stay paused, in milliseconds
    #[arg(long, default_value = "200")]
    pub pause_ms: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "PIPELINE_RUNNER_TIMEOUT")]
    pub timeout: u64,

    /// Print every output item
    #[arg(long)]
    pub print_items: bool,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "PIPELINE_RUNNER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the normalized configuration as TOML
    #[arg(long, conflicts_with = "json")]
    pub normalized: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
