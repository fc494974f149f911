// src/processing/conditioning.rs
//! Per-grid, per-window conditioning: notch, band-pass, optional
//! differentiation, extension, de-meaning, whitening and edge trimming

use super::extension::{demean, extend, extension_factor};
use super::filters::{differentiate, BandPassFilter};
use super::notch::AdaptiveNotch;
use super::whitening::whiten;
use crate::config::DecompositionConfig;
use crate::error::{DecompErrorBuilder, DecompResult};
use crate::segmentation::{AnalysisWindow, WindowSet};
use crate::signal::GridType;
use ndarray::{s, Array2};
use tracing::debug;

/// Whitened, extended data of one (grid, window) pair
#[derive(Debug, Clone)]
pub struct WhitenedBlock {
    pub window_index: usize,
    /// Settled (trimmed) window the columns of `whitened` cover
    pub window: AnalysisWindow,
    pub whitened: Array2<f64>,
    pub whitening: Array2<f64>,
    pub dewhitening: Array2<f64>,
    pub extension_factor: usize,
    pub rank: usize,
}

impl WhitenedBlock {
    pub fn extended_channels(&self) -> usize {
        self.whitened.nrows()
    }

    pub fn samples(&self) -> usize {
        self.whitened.ncols()
    }
}

/// Conditioning chain for one grid
pub struct Conditioner {
    sample_rate: f64,
    notch: Option<AdaptiveNotch>,
    band_pass: BandPassFilter,
    differential: bool,
    extended_target: usize,
    edge_samples: usize,
    min_window_samples: usize,
}

impl Conditioner {
    pub fn new(config: &DecompositionConfig, grid_type: GridType, sample_rate: f64) -> DecompResult<Self> {
        let (low, high) = config.band_for(grid_type);
        let band_pass = BandPassFilter::butterworth(config.conditioning.filter_order, low, high, sample_rate)?;
        let notch = config
            .conditioning
            .notch_enabled
            .then(|| AdaptiveNotch::new(sample_rate, config.conditioning.notch_outlier_factor));

        Ok(Self {
            sample_rate,
            notch,
            band_pass,
            differential: config.differential_mode,
            extended_target: config.extended_channels,
            edge_samples: (config.edges_seconds * sample_rate).round() as usize,
            min_window_samples: config.conditioning.min_window_samples,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Notch, band-pass and (optionally) differentiate a raw channel block
    pub fn filter(&self, raw: &Array2<f64>) -> Array2<f64> {
        let mut filtered = raw.to_owned();
        if let Some(notch) = &self.notch {
            notch.apply(&mut filtered);
        }
        self.band_pass.apply(&mut filtered);
        if self.differential {
            filtered = differentiate(&filtered);
        }
        filtered
    }

    /// Condition window `index` of a grid's active-channel block.
    ///
    /// The first call for a window settles its trimmed bounds in `windows`.
    pub fn condition(
        &self,
        grid_data: &Array2<f64>,
        windows: &mut WindowSet,
        index: usize,
    ) -> DecompResult<WhitenedBlock> {
        let channels = grid_data.nrows();
        if channels == 0 {
            return Err(DecompErrorBuilder::new("conditioning", "condition")
                .invalid_data("channel block", "no active channels after rejection"));
        }

        let segment = windows.segment(index);
        let raw = grid_data.slice(s![.., segment.start..segment.end]).to_owned();
        let filtered = self.filter(&raw);

        let factor = extension_factor(self.extended_target, channels);
        let mut extended = extend(&filtered, factor);
        demean(&mut extended);

        let whitening = whiten(&extended)?;
        let whitened_full = whitening.whitening.dot(&extended);

        let window = windows.settle_trim(index, self.edge_samples, self.min_window_samples);
        let columns = windows.trimmed_columns(index);
        let whitened = whitened_full.slice(s![.., columns]).to_owned();

        debug!(
            window = index,
            channels,
            extended = extended.nrows(),
            rank = whitening.rank,
            start = window.start,
            end = window.end,
            "Window conditioned"
        );

        Ok(WhitenedBlock {
            window_index: index,
            window,
            whitened,
            whitening: whitening.whitening,
            dewhitening: whitening.dewhitening,
            extension_factor: factor,
            rank: whitening.rank,
        })
    }
}
