//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Resolve the configuration path from an environment variable, optionally
//!   seeding it with a sample configuration
//! - Generate `PipelineBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("pipeline.toml")).unwrap();
//! println!("Stages: {}", blueprint.stages.len());
//! ```

mod parser;
mod validator;

pub use contracts::PipelineBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;
use tracing::{debug, info};

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        debug!(path = %path.display(), ?format, "loading configuration");
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Load from the path named by `env_var` if it is set, else from
    /// `default_path`
    ///
    /// With `copy_sample`, a missing file at the env path is first created
    /// as a copy of `default_path` (which then acts as the sample config).
    pub fn load_from_path_or_env(
        default_path: &Path,
        env_var: &str,
        copy_sample: bool,
    ) -> Result<PipelineBlueprint, ContractError> {
        let override_path = std::env::var_os(env_var).filter(|v| !v.is_empty());
        Self::load_with_override(default_path, override_path.as_deref().map(Path::new), copy_sample)
    }

    /// Load from `override_path` if given, else from `default_path`
    ///
    /// See [`ConfigLoader::load_from_path_or_env`] for `copy_sample`.
    pub fn load_with_override(
        default_path: &Path,
        override_path: Option<&Path>,
        copy_sample: bool,
    ) -> Result<PipelineBlueprint, ContractError> {
        let Some(target) = override_path else {
            return Self::load_from_path(default_path);
        };

        if copy_sample && !target.exists() {
            if !default_path.exists() {
                return Err(ContractError::config_parse(format!(
                    "sample config not found: {}",
                    default_path.display()
                )));
            }
            Self::copy_sample_config(default_path, target)?;
        }

        Self::load_from_path(target)
    }

    /// Copy a sample configuration to `dest`
    ///
    /// Parent directories of `dest` are created. An existing `dest` is
    /// overwritten.
    pub fn copy_sample_config(sample: &Path, dest: &Path) -> Result<(), ContractError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(sample, dest)?;
        info!(
            sample = %sample.display(),
            dest = %dest.display(),
            "copied sample configuration"
        );
        Ok(())
    }

    /// Serialize PipelineBlueprint to TOML string
    pub fn to_toml(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize PipelineBlueprint to JSON string
    pub fn to_json(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[pipeline]
name = "numbers"

[[stages]]
name = "inc"
operation = { op = "add", value = 1 }
"#;

    const OTHER_TOML: &str = r#"
[pipeline]
name = "other"

[[stages]]
name = "double"
operation = { op = "mul", value = 2 }
"#;

    #[test]
    fn test_load_from_str_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.pipeline.name, "numbers");
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.pipeline.name, bp2.pipeline.name);
        assert_eq!(bp.stages[0].operation, bp2.stages[0].operation);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.stages.len(), bp2.stages.len());
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[stages]]
name = ""
operation = { op = "identity" }
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, MINIMAL_TOML).unwrap();

        let err = ConfigLoader::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_override_absent_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("default.toml");
        std::fs::write(&default, MINIMAL_TOML).unwrap();

        let bp = ConfigLoader::load_with_override(&default, None, false).unwrap();
        assert_eq!(bp.pipeline.name, "numbers");
    }

    #[test]
    fn test_override_present_wins() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("default.toml");
        let other = dir.path().join("other.toml");
        std::fs::write(&default, MINIMAL_TOML).unwrap();
        std::fs::write(&other, OTHER_TOML).unwrap();

        let bp = ConfigLoader::load_with_override(&default, Some(&other), true).unwrap();
        assert_eq!(bp.pipeline.name, "other");
        // existing override file is not replaced by the sample
        let content = std::fs::read_to_string(&other).unwrap();
        assert!(content.contains("double"));
    }

    #[test]
    fn test_override_missing_copies_sample() {
        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("sample.toml");
        let target = dir.path().join("conf").join("live.toml");
        std::fs::write(&sample, MINIMAL_TOML).unwrap();

        let bp = ConfigLoader::load_with_override(&sample, Some(&target), true).unwrap();
        assert_eq!(bp.pipeline.name, "numbers");
        assert!(target.exists());
    }

    #[test]
    fn test_override_missing_without_copy_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("sample.toml");
        let target = dir.path().join("live.toml");
        std::fs::write(&sample, MINIMAL_TOML).unwrap();

        let err = ConfigLoader::load_with_override(&sample, Some(&target), false).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }

    #[test]
    fn test_missing_sample_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sample = dir.path().join("absent.toml");
        let target = dir.path().join("live.toml");

        let err = ConfigLoader::load_with_override(&sample, Some(&target), true).unwrap_err();
        assert!(err.to_string().contains("sample config not found"));
    }

    #[test]
    fn test_load_from_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("default.toml");
        let other = dir.path().join("other.json");
        std::fs::write(&default, MINIMAL_TOML).unwrap();
        let json = ConfigLoader::to_json(
            &ConfigLoader::load_from_str(OTHER_TOML, ConfigFormat::Toml).unwrap(),
        )
        .unwrap();
        std::fs::write(&other, json).unwrap();

        let var = "CONFIG_LOADER_TEST_LOAD_FROM_ENV_VAR";
        std::env::set_var(var, &other);
        let bp = ConfigLoader::load_from_path_or_env(&default, var, false).unwrap();
        std::env::remove_var(var);

        assert_eq!(bp.pipeline.name, "other");
    }
}
