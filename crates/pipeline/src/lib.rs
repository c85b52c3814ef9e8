//! # Pipeline
//!
//! Multi-stage concurrent processing pipeline.
//!
//! Responsibilities:
//! - Wire an ordered list of transform stages, one tokio task each,
//!   connected by bounded point-to-point channels
//! - Forward external input into the first stage (the dispatcher task)
//! - Stop / pause / resume the whole pipeline, with stop preempting data flow
//! - Per-stage measurement records and metrics
//!
//! # Example
//!
//! ```no_run
//! use pipeline::Pipeline;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> Result<(), pipeline::PipelineError> {
//! let mut pipeline = Pipeline::new();
//! pipeline.add_stage("double", 16, |x: i64| x * 2);
//! let measured = pipeline.add_stage("inc", 16, |x: i64| x + 1);
//! let _records = measured.enable_measurement();
//!
//! let (tx, rx) = mpsc::channel(16);
//! let (handle, mut output) = pipeline.start(rx)?;
//!
//! tx.send(20).await.ok();
//! assert_eq!(output.recv().await, Some(41));
//!
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

mod control;
mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod output;
pub mod pipeline;
mod stage;

pub use contracts::{MeasurementRecord, PipelineState};
pub use error::{BoxError, PipelineError};
pub use handle::StageHandle;
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use output::PipelineOutput;
pub use pipeline::{Pipeline, PipelineConfig, PipelineHandle};
