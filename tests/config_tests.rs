// tests/config_tests.rs
//! Configuration loading, layering and validation

use emg_decomp::config::{ConfigError, ConfigLoader, ContrastFunction, DecompositionConfig, Initialization};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_defaults_are_valid() {
    let config = DecompositionConfig::default();
    assert!(config.validate_consistency().is_ok());
    assert_eq!(config.extended_channels, 1000);
    assert_eq!(config.duplicates.max_lag_divisor, 40.0);
    assert_eq!(config.outliers.max_iterations, 30);
    assert_eq!(config.initialization, Initialization::EnergyBased);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("decomp.toml");
    fs::write(
        &path,
        r#"
iterations = 120
contrast_function = "logcosh"
initialization = "random"

[separation]
peak_distance_seconds = 0.015

[duplicates]
between_grids_threshold = 0.5
"#,
    )
    .unwrap();

    let config = ConfigLoader::with_paths(vec![path]).load().unwrap();
    assert_eq!(config.iterations, 120);
    assert_eq!(config.contrast_function, ContrastFunction::Logcosh);
    assert_eq!(config.initialization, Initialization::Random);
    assert_eq!(config.separation.peak_distance_seconds, 0.015);
    assert_eq!(config.duplicates.between_grids_threshold, 0.5);

    // untouched keys inside an overridden table keep their defaults
    let defaults = DecompositionConfig::default();
    assert_eq!(config.separation.max_fixed_point_iterations, defaults.separation.max_fixed_point_iterations);
    assert_eq!(config.duplicates.jitter_seconds, defaults.duplicates.jitter_seconds);
    assert_eq!(config.sil_threshold, defaults.sil_threshold);
}

#[test]
fn test_later_files_override_earlier() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("base.toml");
    let site = dir.path().join("site.toml");
    fs::write(&base, "iterations = 50\nwindows = 3\n").unwrap();
    fs::write(&site, "iterations = 90\n").unwrap();

    let config = ConfigLoader::with_paths(vec![base, site]).load().unwrap();
    assert_eq!(config.iterations, 90);
    assert_eq!(config.windows, 3);
}

#[test]
fn test_export_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exported.toml");
    let config = DecompositionConfig {
        peeloff: true,
        refine_mu: false,
        seed: 1234,
        ..DecompositionConfig::default()
    };

    ConfigLoader::export_config(&config, &path).unwrap();
    let loaded = ConfigLoader::with_paths(vec![path]).load().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_every_violation_is_reported() {
    let result = ConfigLoader::from_toml_str("windows = 0\nsil_threshold = 1.5\n[outliers]\nrate_sigma = -1.0\n");
    match result {
        Err(ConfigError::ValidationError(errors)) => {
            assert_eq!(errors.len(), 3, "{:?}", errors);
            assert!(errors.iter().any(|e| e.contains("windows")));
            assert!(errors.iter().any(|e| e.contains("sil_threshold")));
            assert!(errors.iter().any(|e| e.contains("rate_sigma")));
        }
        other => panic!("Expected validation errors, got {:?}", other),
    }
}

#[test]
fn test_unknown_contrast_is_parse_error() {
    let result = ConfigLoader::from_toml_str("contrast_function = \"cubic\"");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "iterations = [").unwrap();
    assert!(matches!(
        ConfigLoader::with_paths(vec![path]).load(),
        Err(ConfigError::ParseError(_))
    ));
}
