//! Pipeline runner: blueprint to running pipeline, plus run statistics.

mod orchestrator;
mod stats;

pub use orchestrator::{PausePlan, RunConfig, Runner};
pub use stats::RunStats;
