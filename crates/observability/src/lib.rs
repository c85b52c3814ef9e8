//! # Observability
//!
//! Tracing + Prometheus metrics for the pipeline runtime.
//!
//! ## Features
//!
//! - Tracing initialisation (JSON / Pretty / Compact console output)
//! - Optional plain-text log file next to the console output
//! - Prometheus metrics export
//! - Stage throughput / latency metric helpers and in-memory aggregation
//!
//! ## Example
//!
//! ```ignore
//! use observability::{init_with_config, LogFileConfig, ObservabilityConfig};
//!
//! observability::init_with_config(ObservabilityConfig {
//!     log_file: Some(LogFileConfig::new("logs", "runner")),
//!     metrics_port: None,
//!     ..Default::default()
//! })?;
//! ```

pub mod metrics;

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_item_dispatched, record_measurement_dropped, record_pipeline_state,
    record_stage_failure, record_stage_processed, RunningStats, StageLatencyAggregator,
    StageSummary, StatsSummary,
};

/// Initialise observability with defaults (JSON logs, Prometheus on :9000)
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Console log format
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Default log level when `RUST_LOG` is unset
    pub default_log_level: String,
    /// Optional log file written alongside the console
    pub log_file: Option<LogFileConfig>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    /// Human readable, multi-line
    Pretty,
    /// Compact single line
    Compact,
}

/// Log file location
///
/// The file is `<directory>/<app_name>.log`, or `<app_name>_<pid>.log`
/// when `use_pid` is set. The directory is created on demand and the file
/// is opened in append mode.
#[derive(Debug, Clone)]
pub struct LogFileConfig {
    pub directory: PathBuf,
    pub app_name: String,
    pub use_pid: bool,
}

impl LogFileConfig {
    /// Log file without PID suffix
    pub fn new(directory: impl Into<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            app_name: app_name.into(),
            use_pid: false,
        }
    }

    /// Append the current process id to the file name
    pub fn with_pid(mut self) -> Self {
        self.use_pid = true;
        self
    }

    /// Full path of the log file
    pub fn file_path(&self) -> PathBuf {
        let file_name = if self.use_pid {
            format!("{}_{}.log", self.app_name, std::process::id())
        } else {
            format!("{}.log", self.app_name)
        };
        self.directory.join(file_name)
    }

    /// Create the directory and open the file for appending
    pub fn open(&self) -> Result<File> {
        std::fs::create_dir_all(&self.directory).with_context(|| {
            format!("Failed to create log directory {}", self.directory.display())
        })?;

        let path = self.file_path();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))
    }
}

/// Initialise with a custom configuration
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    // 1. Initialize Tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let console_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    let file_layer = match &config.log_file {
        Some(file_config) => {
            let file = Arc::new(file_config.open()?);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(file)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    // 2. Initialize Prometheus Exporter (if enabled)
    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        log_file = ?config.log_file.as_ref().map(LogFileConfig::file_path),
        "Observability initialized"
    );

    Ok(())
}

/// Initialise Prometheus metrics only (tracing already set up elsewhere)
pub fn init_metrics_only(port: u16) -> Result<()> {
    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
