//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::CinderConfig;
use std::path::Path;

/// Name of the configuration file within a project directory.
pub const CONFIG_FILE: &str = "cinder.toml";

/// Loads and validates a `cinder.toml` configuration from a project directory.
///
/// Reads `<project_dir>/cinder.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<CinderConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::IoError {
            path: config_path.clone(),
            source,
        })?;
    load_config_from_str(&content)
}

/// Parses and validates a `cinder.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<CinderConfig, ConfigError> {
    let config: CinderConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &CinderConfig) -> Result<(), ConfigError> {
    if config.task.path.trim().is_empty() {
        return Err(ConfigError::MissingField("task.path".to_string()));
    }
    if config.includes.roots.iter().any(|r| r.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "include roots must not be empty strings".to_string(),
        ));
    }
    if config.sources.files.iter().any(|f| f.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "source files must not be empty strings".to_string(),
        ));
    }
    if config.cache.dir.trim().is_empty() {
        return Err(ConfigError::MissingField("cache.dir".to_string()));
    }
    Ok(())
}
