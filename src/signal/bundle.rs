// src/signal/bundle.rs
//! Multi-grid HD-EMG recording handed to a decomposition session

use crate::error::{DecompErrorBuilder, DecompResult};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Electrode grid type, selects the band-pass corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridType {
    Surface,
    Intra,
}

/// One electrode grid's geometry and channel mask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectrodeGrid {
    pub channel_count: usize,
    pub grid_type: GridType,
    /// Inter-electrode distance in millimetres
    pub inter_electrode_distance_mm: f64,
    /// 2-D electrode position per channel
    pub coordinates: Vec<(f64, f64)>,
    /// `true` for channels excluded from decomposition
    pub rejected: Vec<bool>,
}

impl ElectrodeGrid {
    /// Grid laid out row-major on a square lattice
    pub fn new(channel_count: usize, grid_type: GridType, inter_electrode_distance_mm: f64) -> Self {
        let columns = (channel_count as f64).sqrt().ceil().max(1.0) as usize;
        let coordinates = (0..channel_count)
            .map(|ch| {
                let row = ch / columns;
                let col = ch % columns;
                (col as f64 * inter_electrode_distance_mm, row as f64 * inter_electrode_distance_mm)
            })
            .collect();
        Self {
            channel_count,
            grid_type,
            inter_electrode_distance_mm,
            coordinates,
            rejected: vec![false; channel_count],
        }
    }

    /// Replace the default lattice with explicit coordinates
    pub fn with_coordinates(mut self, coordinates: Vec<(f64, f64)>) -> Self {
        self.coordinates = coordinates;
        self
    }

    /// Number of channels not rejected
    pub fn active_count(&self) -> usize {
        self.rejected.iter().filter(|&&r| !r).count()
    }
}

/// What [`SignalBundle::sanitize`] had to repair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizeReport {
    /// Isolated non-finite samples replaced by zero
    pub zeroed_samples: usize,
    /// `(grid, channel)` pairs rejected because no sample was finite
    pub rejected_channels: Vec<(usize, usize)>,
    /// Non-finite reference samples replaced by zero
    pub zeroed_reference_samples: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.zeroed_samples == 0 && self.rejected_channels.is_empty() && self.zeroed_reference_samples == 0
    }

    /// Human-readable warnings for the progress channel
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.zeroed_samples > 0 {
            warnings.push(format!("Replaced {} non-finite samples with zero", self.zeroed_samples));
        }
        for (grid, channel) in &self.rejected_channels {
            warnings.push(format!("Grid {} channel {} has no finite samples and was rejected", grid, channel));
        }
        if self.zeroed_reference_samples > 0 {
            warnings.push(format!(
                "Replaced {} non-finite reference samples with zero",
                self.zeroed_reference_samples
            ));
        }
        warnings
    }
}

/// Raw recording plus metadata.
///
/// `data` is channels × samples in microvolts; rows are ordered grid by grid.
#[derive(Debug, Clone)]
pub struct SignalBundle {
    data: Array2<f64>,
    sample_rate: f64,
    grids: Vec<ElectrodeGrid>,
    reference: Option<Vec<f64>>,
}

impl SignalBundle {
    pub fn new(data: Array2<f64>, sample_rate: f64, grids: Vec<ElectrodeGrid>) -> DecompResult<Self> {
        let err = || DecompErrorBuilder::new("signal_bundle", "new");

        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(err().invalid_data("sample rate", &format!("must be positive, got {}", sample_rate)));
        }
        if grids.is_empty() {
            return Err(err().invalid_data("grid layout", "at least one electrode grid is required"));
        }
        let expected: usize = grids.iter().map(|g| g.channel_count).sum();
        if data.nrows() != expected {
            return Err(err().invalid_data(
                "channel matrix",
                &format!("grids describe {} channels but data has {} rows", expected, data.nrows()),
            ));
        }
        if data.ncols() == 0 {
            return Err(err().invalid_data("channel matrix", "recording has no samples"));
        }
        for (index, grid) in grids.iter().enumerate() {
            if grid.rejected.len() != grid.channel_count {
                return Err(err().invalid_data(
                    "rejected-channel mask",
                    &format!("grid {} mask has {} entries for {} channels", index, grid.rejected.len(), grid.channel_count),
                ));
            }
            if !grid.coordinates.is_empty() && grid.coordinates.len() != grid.channel_count {
                return Err(err().invalid_data(
                    "electrode coordinates",
                    &format!("grid {} has {} coordinates for {} channels", index, grid.coordinates.len(), grid.channel_count),
                ));
            }
        }

        Ok(Self {
            data,
            sample_rate,
            grids,
            reference: None,
        })
    }

    /// Attach a force/target reference. A length mismatch is tolerated here and
    /// makes the segmenter fall back to equal windows.
    pub fn with_reference(mut self, reference: Vec<f64>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn channel_count(&self) -> usize {
        self.data.nrows()
    }

    pub fn grids(&self) -> &[ElectrodeGrid] {
        &self.grids
    }

    pub fn grid_count(&self) -> usize {
        self.grids.len()
    }

    pub fn reference(&self) -> Option<&[f64]> {
        self.reference.as_deref()
    }

    /// Row range of a grid inside the channel matrix
    pub fn grid_channel_range(&self, grid: usize) -> Range<usize> {
        let start: usize = self.grids[..grid].iter().map(|g| g.channel_count).sum();
        start..start + self.grids[grid].channel_count
    }

    /// Edit the rejected-channel mask before a run starts
    pub fn set_channel_rejected(&mut self, grid: usize, channel: usize, rejected: bool) -> DecompResult<()> {
        let target = self
            .grids
            .get_mut(grid)
            .and_then(|g| g.rejected.get_mut(channel))
            .ok_or_else(|| {
                DecompErrorBuilder::new("signal_bundle", "set_channel_rejected")
                    .invalid_data("channel index", &format!("grid {} channel {} does not exist", grid, channel))
            })?;
        *target = rejected;
        Ok(())
    }

    /// Global row indices of a grid's non-rejected channels
    pub fn active_channels(&self, grid: usize) -> Vec<usize> {
        let range = self.grid_channel_range(grid);
        range
            .zip(self.grids[grid].rejected.iter())
            .filter(|(_, &rejected)| !rejected)
            .map(|(row, _)| row)
            .collect()
    }

    /// Copy of the grid's non-rejected channels
    pub fn grid_block(&self, grid: usize) -> Array2<f64> {
        self.data.select(Axis(0), &self.active_channels(grid))
    }

    /// Zero isolated non-finite samples and reject channels with none finite
    pub fn sanitize(&mut self) -> SanitizeReport {
        let mut report = SanitizeReport::default();

        for grid in 0..self.grids.len() {
            let range = self.grid_channel_range(grid);
            for (local, row) in range.enumerate() {
                let mut channel = self.data.row_mut(row);
                let finite = channel.iter().filter(|v| v.is_finite()).count();
                if finite == 0 {
                    channel.fill(0.0);
                    if !self.grids[grid].rejected[local] {
                        self.grids[grid].rejected[local] = true;
                        report.rejected_channels.push((grid, local));
                    }
                    continue;
                }
                for v in channel.iter_mut() {
                    if !v.is_finite() {
                        *v = 0.0;
                        report.zeroed_samples += 1;
                    }
                }
            }
        }

        if let Some(reference) = self.reference.as_mut() {
            for v in reference.iter_mut() {
                if !v.is_finite() {
                    *v = 0.0;
                    report.zeroed_reference_samples += 1;
                }
            }
        }

        report
    }
}
