// src/config/loader.rs
//! Configuration loader: TOML files layered over defaults

use crate::config::DecompositionConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Configuration parse error: {0}")]
    ParseError(String),
    #[error("Configuration validation errors: {}", .0.join("; "))]
    ValidationError(Vec<String>),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Loads a [`DecompositionConfig`] from one or more TOML files.
///
/// Later files override earlier ones key by key; anything not mentioned keeps
/// its default.
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self { config_paths: paths }
    }

    /// Load, merge and validate configuration
    pub fn load(&self) -> Result<DecompositionConfig, ConfigError> {
        let mut merged = toml::Value::try_from(DecompositionConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        for path in &self.config_paths {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            let file_value = Self::load_config_file(path)?;
            merge_toml_values(&mut merged, file_value);
        }

        let config: DecompositionConfig = merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;
        config.validate_consistency().map_err(ConfigError::ValidationError)?;
        Ok(config)
    }

    /// Parse configuration from an in-memory TOML document
    pub fn from_toml_str(content: &str) -> Result<DecompositionConfig, ConfigError> {
        let mut merged = toml::Value::try_from(DecompositionConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let value: toml::Value = toml::from_str(content)?;
        merge_toml_values(&mut merged, value);

        let config: DecompositionConfig = merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;
        config.validate_consistency().map_err(ConfigError::ValidationError)?;
        Ok(config)
    }

    /// Export a configuration to file
    pub fn export_config<P: AsRef<Path>>(config: &DecompositionConfig, path: P) -> Result<(), ConfigError> {
        let toml_content =
            toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    fn load_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_toml_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_nested_tables() {
        let mut base: toml::Value = toml::from_str("a = 1\n[b]\nc = 2\nd = 3").unwrap();
        let overlay: toml::Value = toml::from_str("[b]\nd = 4").unwrap();
        merge_toml_values(&mut base, overlay);

        assert_eq!(base["a"].as_integer(), Some(1));
        assert_eq!(base["b"]["c"].as_integer(), Some(2));
        assert_eq!(base["b"]["d"].as_integer(), Some(4));
    }

    #[test]
    fn test_from_toml_str_rejects_invalid_values() {
        let result = ConfigLoader::from_toml_str("windows = 0");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_missing_file() {
        let loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/decomp.toml")]);
        assert!(matches!(loader.load(), Err(ConfigError::FileNotFound(_))));
    }
}
