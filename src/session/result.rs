// src/session/result.rs
//! Motor units and the final decomposition result

use crate::segmentation::AnalysisWindow;
use crate::utils::{discharge_rates, isi_cov, mean};
use serde::{Deserialize, Serialize};

/// An accepted motor unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorUnit {
    /// Electrode grid the unit belongs to
    pub grid: usize,
    /// Normalised pulse train over the whole recording
    pub pulse_train: Vec<f64>,
    /// Strictly increasing sample indices into the recording
    pub discharges: Vec<usize>,
    pub sil: f64,
    /// Inter-discharge interval coefficient of variation
    pub cov: f64,
    /// CKC filter in the extended channel space
    pub filter: Vec<f64>,
    /// Window the filter was found in
    pub source_window: usize,
}

impl MotorUnit {
    pub fn discharge_count(&self) -> usize {
        self.discharges.len()
    }

    /// Mean instantaneous discharge rate in Hz
    pub fn mean_discharge_rate(&self, sample_rate: f64) -> Option<f64> {
        let rates = discharge_rates(&self.discharges, sample_rate);
        (!rates.is_empty()).then(|| mean(&rates))
    }

    /// Recompute `cov` after the discharges changed
    pub fn update_cov(&mut self) {
        self.cov = isi_cov(&self.discharges);
    }

    /// CoV used for ranking duplicates; undefined CoV ranks last
    pub(crate) fn ranking_cov(&self) -> f64 {
        if self.cov.is_finite() {
            self.cov
        } else {
            f64::INFINITY
        }
    }
}

/// A grid that could not be decomposed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridFailure {
    pub grid: usize,
    pub reason: String,
}

/// Final per-grid motor units plus the metadata needed to persist them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionResult {
    pub sample_rate: f64,
    pub samples: usize,
    pub grid_count: usize,
    /// Settled analysis windows
    pub windows: Vec<AnalysisWindow>,
    /// Motor units indexed by grid
    pub units: Vec<Vec<MotorUnit>>,
    pub failed_grids: Vec<GridFailure>,
}

impl DecompositionResult {
    pub fn total_units(&self) -> usize {
        self.units.iter().map(Vec::len).sum()
    }

    pub fn units_for_grid(&self, grid: usize) -> &[MotorUnit] {
        self.units.get(grid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_units(&self) -> impl Iterator<Item = &MotorUnit> {
        self.units.iter().flatten()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
