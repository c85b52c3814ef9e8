//! PipelineBlueprint - Config Loader output
//!
//! Describes a complete pipeline: settings, input feeding and the ordered
//! stage list.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::Operation;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Pipeline-wide settings
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineSettings,

    /// Input feeding settings
    #[serde(default)]
    #[validate(nested)]
    pub input: InputSettings,

    /// Ordered stage list
    #[validate(nested)]
    pub stages: Vec<StageConfig>,
}

/// Pipeline-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineSettings {
    /// Pipeline name (used in logs)
    #[serde(default = "default_pipeline_name")]
    #[validate(length(min = 1, message = "pipeline name cannot be empty"))]
    pub name: String,

    /// Capacity of the public output queue
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, message = "output_capacity must be >= 1"))]
    pub output_capacity: usize,

    /// Capacity of each measurement outlet
    #[serde(default = "default_measurement_capacity")]
    #[validate(range(min = 1, message = "measurement_capacity must be >= 1"))]
    pub measurement_capacity: usize,

    /// Time granted to stage tasks to terminate after stop, in milliseconds
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            output_capacity: default_capacity(),
            measurement_capacity: default_measurement_capacity(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

/// Input feeding settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InputSettings {
    /// Capacity of the input queue feeding the dispatcher
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, message = "input capacity must be >= 1"))]
    pub capacity: usize,

    /// Optional rate limit applied by the feeder
    #[serde(default)]
    pub rate: Option<RateSettings>,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            rate: None,
        }
    }
}

/// Rate limit: `permits` items per `period_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSettings {
    pub permits: u32,
    pub period_ms: u64,
}

/// Stage definition
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StageConfig {
    /// Stage name (instrumentation label, not required to be unique)
    #[validate(length(min = 1, message = "stage name cannot be empty"))]
    pub name: String,

    /// Inbound buffer capacity
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, message = "buffer_capacity must be >= 1"))]
    pub buffer_capacity: usize,

    /// Transform applied to each item
    pub operation: Operation,

    /// Enable measurement from the start
    #[serde(default)]
    pub measure: bool,
}

fn default_pipeline_name() -> String {
    "pipeline".to_string()
}

fn default_capacity() -> usize {
    100
}

fn default_measurement_capacity() -> usize {
    1024
}

fn default_stop_grace_ms() -> u64 {
    1000
}

impl PipelineBlueprint {
    /// Stages with measurement enabled
    pub fn measured_stages(&self) -> impl Iterator<Item = &StageConfig> {
        self.stages.iter().filter(|s| s.measure)
    }

    /// Sum of every stage buffer plus the output queue
    pub fn total_buffer_capacity(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.buffer_capacity)
            .sum::<usize>()
            + self.pipeline.output_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[stages]]
name = "inc"
operation = { op = "add", value = 1 }
"#;

    #[test]
    fn test_defaults_applied() {
        let bp: PipelineBlueprint = toml::from_str(MINIMAL).unwrap();
        assert_eq!(bp.version, ConfigVersion::V1);
        assert_eq!(bp.pipeline.name, "pipeline");
        assert_eq!(bp.pipeline.output_capacity, 100);
        assert_eq!(bp.pipeline.measurement_capacity, 1024);
        assert_eq!(bp.input.capacity, 100);
        assert!(bp.input.rate.is_none());
        assert_eq!(bp.stages[0].buffer_capacity, 100);
        assert!(!bp.stages[0].measure);
        assert!(bp.validate().is_ok());
    }

    #[test]
    fn test_derive_validation_rejects_zero_capacity() {
        let mut bp: PipelineBlueprint = toml::from_str(MINIMAL).unwrap();
        bp.stages[0].buffer_capacity = 0;
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_total_buffer_capacity() {
        let mut bp: PipelineBlueprint = toml::from_str(MINIMAL).unwrap();
        bp.stages.push(StageConfig {
            name: "double".to_string(),
            buffer_capacity: 10,
            operation: Operation::Mul(2),
            measure: true,
        });
        assert_eq!(bp.total_buffer_capacity(), 100 + 10 + 100);
        assert_eq!(bp.measured_stages().count(), 1);
    }
}
