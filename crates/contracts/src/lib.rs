//! # Contracts
//!
//! Shared interface types for the staged-pipeline workspace. Every other
//! crate depends on this one; this crate depends on no workspace crate.
//!
//! - `PipelineState`: the pipeline lifecycle state machine
//! - `MeasurementRecord`: per-item instrumentation event
//! - `PipelineBlueprint`: the configuration schema loaded by `config_loader`
//! - `Operation`: arithmetic transforms a blueprint can describe

mod blueprint;
mod error;
mod measurement;
mod operation;
mod state;

pub use blueprint::*;
pub use error::*;
pub use measurement::MeasurementRecord;
pub use operation::Operation;
pub use state::PipelineState;
