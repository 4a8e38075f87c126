use std::path::Path;

use crate::config::schema::EngineSettings;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/settings-v1.json");

/// Loads settings from a YAML or JSON file.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<EngineSettings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

/// Parses settings text. JSON is accepted as a subset of YAML.
pub fn load_settings_from_str(content: &str) -> Result<EngineSettings, ConfigError> {
    let value: serde_json::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    validate_schema(&value)?;

    let settings: EngineSettings =
        serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;

    validate_settings(&settings)?;

    Ok(settings)
}

fn validate_schema(value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let errors: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

fn validate_settings(settings: &EngineSettings) -> Result<(), ConfigError> {
    if settings.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported settings version: {}", settings.version),
        });
    }

    if settings.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "batchSize must be greater than 0".to_string(),
        });
    }

    if settings.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "workerCount must be greater than 0".to_string(),
        });
    }

    if settings.row_key_field.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "rowKeyField must not be blank".to_string(),
        });
    }

    if settings.resolver_cache_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "resolverCacheCapacity must be greater than 0".to_string(),
        });
    }

    Ok(())
}
