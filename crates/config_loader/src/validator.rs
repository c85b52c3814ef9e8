//! Configuration validation
//!
//! Rules:
//! - field-level constraints declared with `validator` derive (non-empty
//!   names, capacities >= 1)
//! - at least one stage
//! - rate limit, if present, has permits > 0 and period_ms > 0
//! - stop grace period > 0

use contracts::{ContractError, PipelineBlueprint};
use ::validator::Validate;

/// Validate a PipelineBlueprint
///
/// Returns the first error encountered.
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_stage_list(blueprint)?;
    validate_fields(blueprint)?;
    validate_rate(blueprint)?;
    validate_grace_period(blueprint)?;
    Ok(())
}

fn validate_stage_list(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.stages.is_empty() {
        return Err(ContractError::config_validation(
            "stages",
            "at least one stage is required",
        ));
    }
    Ok(())
}

/// Derive-declared field constraints
fn validate_fields(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

fn validate_rate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let Some(rate) = blueprint.input.rate else {
        return Ok(());
    };

    if rate.permits == 0 {
        return Err(ContractError::config_validation(
            "input.rate.permits",
            "permits must be > 0",
        ));
    }
    if rate.period_ms == 0 {
        return Err(ContractError::config_validation(
            "input.rate.period_ms",
            "period_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_grace_period(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.pipeline.stop_grace_ms == 0 {
        return Err(ContractError::config_validation(
            "pipeline.stop_grace_ms",
            "stop_grace_ms must be > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, InputSettings, Operation, PipelineSettings, RateSettings, StageConfig,
    };

    fn stage(name: &str) -> StageConfig {
        StageConfig {
            name: name.to_string(),
            buffer_capacity: 10,
            operation: Operation::Add(1),
            measure: false,
        }
    }

    fn blueprint() -> PipelineBlueprint {
        PipelineBlueprint {
            version: ConfigVersion::V1,
            pipeline: PipelineSettings::default(),
            input: InputSettings::default(),
            stages: vec![stage("a"), stage("b")],
        }
    }

    #[test]
    fn test_valid_blueprint() {
        assert!(validate(&blueprint()).is_ok());
    }

    #[test]
    fn test_duplicate_stage_names_allowed() {
        let mut bp = blueprint();
        bp.stages.push(stage("a"));
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_empty_stage_list() {
        let mut bp = blueprint();
        bp.stages.clear();
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("at least one stage"));
    }

    #[test]
    fn test_empty_stage_name() {
        let mut bp = blueprint();
        bp.stages[1].name.clear();
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("stage name cannot be empty"));
    }

    #[test]
    fn test_zero_output_capacity() {
        let mut bp = blueprint();
        bp.pipeline.output_capacity = 0;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_zero_rate_permits() {
        let mut bp = blueprint();
        bp.input.rate = Some(RateSettings {
            permits: 0,
            period_ms: 100,
        });
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("input.rate.permits"));
    }

    #[test]
    fn test_zero_grace_period() {
        let mut bp = blueprint();
        bp.pipeline.stop_grace_ms = 0;
        assert!(validate(&bp).is_err());
    }
}
