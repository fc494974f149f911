// src/postprocess/aggregator.rs
//! Full-length pulse trains from every window's accepted filters

use crate::processing::WhitenedBlock;
use crate::separation::{silhouette, CandidateUnit, SpikeDetector};
use crate::session::result::MotorUnit;
use crate::utils::isi_cov;
use ndarray::Array1;
use tracing::debug;

/// Reapplies each accepted filter to every window of its grid
#[derive(Debug, Clone)]
pub struct Aggregator {
    detector: SpikeDetector,
    samples: usize,
}

impl Aggregator {
    pub fn new(detector: SpikeDetector, samples: usize) -> Self {
        Self { detector, samples }
    }

    /// Sign-squared projection of `filter` over all blocks, zero outside the windows.
    ///
    /// For block `b` this is `cᵀ C⁺_b x_b = (W_b c)ᵀ z_b`, which inside the
    /// filter's own window reproduces `wᵀ z`.
    pub fn full_pulse_train(&self, filter: &Array1<f64>, blocks: &[WhitenedBlock]) -> Vec<f64> {
        let mut pulse = vec![0.0; self.samples];
        for block in blocks {
            if block.whitening.ncols() != filter.len() {
                continue;
            }
            let projected_filter = block.whitening.dot(filter);
            let projection = projected_filter.dot(&block.whitened);
            for (offset, v) in projection.iter().enumerate() {
                if let Some(slot) = pulse.get_mut(block.window.start + offset) {
                    *slot = v * v.abs();
                }
            }
        }
        pulse
    }

    /// Build one motor unit per candidate; units without discharges are dropped
    pub fn aggregate(&self, grid: usize, candidates: &[CandidateUnit], blocks: &[WhitenedBlock]) -> Vec<MotorUnit> {
        candidates
            .iter()
            .filter_map(|candidate| {
                let pulse = self.full_pulse_train(&candidate.filter, blocks);
                let detection = self.detector.detect(pulse);
                if detection.discharges.is_empty() {
                    debug!(grid, window = candidate.window_index, "Aggregated train has no discharges");
                    return None;
                }
                let sil = silhouette(&detection);
                let cov = isi_cov(&detection.discharges);
                Some(MotorUnit {
                    grid,
                    pulse_train: detection.pulse_train,
                    discharges: detection.discharges,
                    sil,
                    cov,
                    filter: candidate.filter.to_vec(),
                    source_window: candidate.window_index,
                })
            })
            .collect()
    }
}
