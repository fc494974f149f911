// src/config/mod.rs
//! Decomposition configuration

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};

/// Contrast function driving the fixed-point separation update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContrastFunction {
    Square,
    Skew,
    Exp,
    Logcosh,
}

/// Separation vector initialisation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Initialization {
    /// Whitened column with the largest squared channel-sum, cycling through the ranking
    EnergyBased,
    Random,
}

/// Complete decomposition configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DecompositionConfig {
    #[serde(default = "defaults::iterations")]
    pub iterations: usize,

    #[serde(default = "defaults::windows")]
    pub windows: usize,

    #[serde(default = "defaults::threshold_target")]
    pub threshold_target: f64,

    #[serde(default = "defaults::extended_channels")]
    pub extended_channels: usize,

    #[serde(default = "defaults::duplicates_threshold")]
    pub duplicates_threshold: f64,

    #[serde(default = "defaults::sil_threshold")]
    pub sil_threshold: f64,

    #[serde(default = "defaults::cov_threshold")]
    pub cov_threshold: f64,

    #[serde(default)]
    pub cov_filter: bool,

    #[serde(default)]
    pub peeloff: bool,

    #[serde(default = "defaults::contrast_function")]
    pub contrast_function: ContrastFunction,

    #[serde(default = "defaults::initialization")]
    pub initialization: Initialization,

    #[serde(default = "defaults::refine_mu")]
    pub refine_mu: bool,

    #[serde(default)]
    pub duplicates_between_grids: bool,

    #[serde(default)]
    pub differential_mode: bool,

    #[serde(default = "defaults::edges_seconds")]
    pub edges_seconds: f64,

    #[serde(default = "defaults::seed")]
    pub seed: u64,

    #[serde(default)]
    pub conditioning: ConditioningConfig,

    #[serde(default)]
    pub separation: SeparationTuning,

    #[serde(default)]
    pub duplicates: DuplicateConfig,

    #[serde(default)]
    pub outliers: OutlierConfig,
}

/// Filter bank and segmentation tuning
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConditioningConfig {
    pub notch_enabled: bool,
    pub notch_outlier_factor: f64,
    pub filter_order: usize,
    pub surface_band_hz: (f64, f64),
    pub intra_band_hz: (f64, f64),
    pub min_window_samples: usize,
    pub reference_noise_floor: f64,
}

/// Fixed-point, spike detection and peel-off tuning
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SeparationTuning {
    pub max_fixed_point_iterations: usize,
    pub fixed_point_tolerance: f64,
    pub peak_distance_seconds: f64,
    pub aggregation_peak_distance_seconds: f64,
    pub discharge_outlier_sigma: f64,
    pub peeloff_half_window_seconds: f64,
}

/// Duplicate removal tuning
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DuplicateConfig {
    pub jitter_seconds: f64,
    pub max_lag_divisor: f64,
    pub correlation_gate: f64,
    pub between_grids_threshold: f64,
}

/// Discharge-rate outlier removal tuning
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutlierConfig {
    pub cov_threshold: f64,
    pub max_iterations: usize,
    pub rate_sigma: f64,
}

/// Default value providers using constants
mod defaults {
    use super::{ContrastFunction, Initialization};
    use crate::config::constants::*;

    pub fn iterations() -> usize { separation::DEFAULT_ITERATIONS }
    pub fn windows() -> usize { segmentation::DEFAULT_WINDOW_COUNT }
    pub fn threshold_target() -> f64 { segmentation::DEFAULT_THRESHOLD_TARGET }
    pub fn extended_channels() -> usize { conditioning::DEFAULT_EXTENDED_CHANNELS }
    pub fn duplicates_threshold() -> f64 { duplicates::DEFAULT_THRESHOLD }
    pub fn sil_threshold() -> f64 { separation::DEFAULT_SIL_THRESHOLD }
    pub fn cov_threshold() -> f64 { separation::DEFAULT_COV_THRESHOLD }
    pub fn contrast_function() -> ContrastFunction { ContrastFunction::Skew }
    pub fn initialization() -> Initialization { Initialization::EnergyBased }
    pub fn refine_mu() -> bool { true }
    pub fn edges_seconds() -> f64 { conditioning::DEFAULT_EDGES_SECONDS }
    pub fn seed() -> u64 { separation::DEFAULT_SEED }
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            iterations: defaults::iterations(),
            windows: defaults::windows(),
            threshold_target: defaults::threshold_target(),
            extended_channels: defaults::extended_channels(),
            duplicates_threshold: defaults::duplicates_threshold(),
            sil_threshold: defaults::sil_threshold(),
            cov_threshold: defaults::cov_threshold(),
            cov_filter: false,
            peeloff: false,
            contrast_function: defaults::contrast_function(),
            initialization: defaults::initialization(),
            refine_mu: defaults::refine_mu(),
            duplicates_between_grids: false,
            differential_mode: false,
            edges_seconds: defaults::edges_seconds(),
            seed: defaults::seed(),
            conditioning: ConditioningConfig::default(),
            separation: SeparationTuning::default(),
            duplicates: DuplicateConfig::default(),
            outliers: OutlierConfig::default(),
        }
    }
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            notch_enabled: true,
            notch_outlier_factor: conditioning::NOTCH_OUTLIER_FACTOR,
            filter_order: conditioning::DEFAULT_FILTER_ORDER,
            surface_band_hz: conditioning::SURFACE_BAND_HZ,
            intra_band_hz: conditioning::INTRA_BAND_HZ,
            min_window_samples: segmentation::MIN_WINDOW_SAMPLES,
            reference_noise_floor: segmentation::REFERENCE_NOISE_FLOOR,
        }
    }
}

impl Default for SeparationTuning {
    fn default() -> Self {
        Self {
            max_fixed_point_iterations: separation::MAX_FIXED_POINT_ITERATIONS,
            fixed_point_tolerance: separation::FIXED_POINT_TOLERANCE,
            peak_distance_seconds: separation::PEAK_DISTANCE_SECONDS,
            aggregation_peak_distance_seconds: separation::AGGREGATION_PEAK_DISTANCE_SECONDS,
            discharge_outlier_sigma: separation::DISCHARGE_OUTLIER_SIGMA,
            peeloff_half_window_seconds: separation::PEELOFF_HALF_WINDOW_SECONDS,
        }
    }
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            jitter_seconds: duplicates::JITTER_SECONDS,
            max_lag_divisor: duplicates::MAX_LAG_DIVISOR,
            correlation_gate: duplicates::CORRELATION_GATE,
            between_grids_threshold: duplicates::DEFAULT_THRESHOLD,
        }
    }
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            cov_threshold: outliers::COV_THRESHOLD,
            max_iterations: outliers::MAX_ITERATIONS,
            rate_sigma: outliers::RATE_SIGMA,
        }
    }
}

fn check_unit_interval(errors: &mut Vec<String>, name: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(format!("{} must be within [0, 1], got {}", name, value));
    }
}

fn check_positive(errors: &mut Vec<String>, name: &str, value: f64) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(format!("{} must be positive, got {}", name, value));
    }
}

impl DecompositionConfig {
    /// Validate configuration consistency, reporting every violation
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.windows == 0 {
            errors.push("windows must be at least 1".to_string());
        }
        if self.extended_channels == 0 {
            errors.push("extended_channels must be at least 1".to_string());
        }
        check_unit_interval(&mut errors, "threshold_target", self.threshold_target);
        check_unit_interval(&mut errors, "duplicates_threshold", self.duplicates_threshold);
        check_unit_interval(&mut errors, "sil_threshold", self.sil_threshold);
        check_unit_interval(&mut errors, "cov_threshold", self.cov_threshold);
        if !(self.edges_seconds.is_finite() && self.edges_seconds >= 0.0) {
            errors.push(format!("edges_seconds must be non-negative, got {}", self.edges_seconds));
        }

        let c = &self.conditioning;
        if c.filter_order == 0 || c.filter_order > conditioning::MAX_FILTER_ORDER {
            errors.push(format!(
                "conditioning.filter_order must be 1-{}, got {}",
                conditioning::MAX_FILTER_ORDER,
                c.filter_order
            ));
        }
        for (name, (low, high)) in [("surface_band_hz", c.surface_band_hz), ("intra_band_hz", c.intra_band_hz)] {
            if !(low > 0.0 && high > low) {
                errors.push(format!("conditioning.{} must satisfy 0 < low < high, got ({}, {})", name, low, high));
            }
        }
        check_positive(&mut errors, "conditioning.notch_outlier_factor", c.notch_outlier_factor);
        if c.min_window_samples < 2 {
            errors.push("conditioning.min_window_samples must be at least 2".to_string());
        }

        let s = &self.separation;
        if s.max_fixed_point_iterations == 0 {
            errors.push("separation.max_fixed_point_iterations must be at least 1".to_string());
        }
        check_positive(&mut errors, "separation.fixed_point_tolerance", s.fixed_point_tolerance);
        check_positive(&mut errors, "separation.peak_distance_seconds", s.peak_distance_seconds);
        check_positive(
            &mut errors,
            "separation.aggregation_peak_distance_seconds",
            s.aggregation_peak_distance_seconds,
        );
        check_positive(&mut errors, "separation.discharge_outlier_sigma", s.discharge_outlier_sigma);
        check_positive(&mut errors, "separation.peeloff_half_window_seconds", s.peeloff_half_window_seconds);

        let d = &self.duplicates;
        if !(d.jitter_seconds.is_finite() && d.jitter_seconds >= 0.0) {
            errors.push(format!("duplicates.jitter_seconds must be non-negative, got {}", d.jitter_seconds));
        }
        check_positive(&mut errors, "duplicates.max_lag_divisor", d.max_lag_divisor);
        check_unit_interval(&mut errors, "duplicates.correlation_gate", d.correlation_gate);
        check_unit_interval(&mut errors, "duplicates.between_grids_threshold", d.between_grids_threshold);

        let o = &self.outliers;
        check_positive(&mut errors, "outliers.cov_threshold", o.cov_threshold);
        check_positive(&mut errors, "outliers.rate_sigma", o.rate_sigma);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Band-pass corners for a grid type
    pub fn band_for(&self, grid_type: crate::signal::GridType) -> (f64, f64) {
        match grid_type {
            crate::signal::GridType::Surface => self.conditioning.surface_band_hz,
            crate::signal::GridType::Intra => self.conditioning.intra_band_hz,
        }
    }

    /// Get configuration summary
    pub fn get_summary(&self) -> ConfigSummary {
        ConfigSummary {
            iterations: self.iterations,
            windows: self.windows,
            extended_channels: self.extended_channels,
            contrast_function: self.contrast_function,
            initialization: self.initialization,
            peeloff: self.peeloff,
            refine_mu: self.refine_mu,
            duplicates_between_grids: self.duplicates_between_grids,
        }
    }
}

/// Configuration summary for display/logging
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub iterations: usize,
    pub windows: usize,
    pub extended_channels: usize,
    pub contrast_function: ContrastFunction,
    pub initialization: Initialization,
    pub peeloff: bool,
    pub refine_mu: bool,
    pub duplicates_between_grids: bool,
}
