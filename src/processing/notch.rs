// src/processing/notch.rs
//! Adaptive spectral notch for line interference
//!
//! Each channel is cut into one-second sub-windows. In each sub-window, FFT bins
//! that stand far above the median of their spectral neighbourhood are treated
//! as interference; their contribution is rebuilt by inverse FFT and subtracted.

use crate::config::constants::conditioning::{NOTCH_NEIGHBOURHOOD_HZ, NOTCH_SUBWINDOW_SECONDS};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Scale factor turning a median absolute deviation into a normal-equivalent std
const MAD_TO_STD: f64 = 1.4826;

/// Sub-windows shorter than this are left untouched
const MIN_SUBWINDOW_SAMPLES: usize = 64;

pub struct AdaptiveNotch {
    sample_rate: f64,
    outlier_factor: f64,
    subwindow: usize,
    planner: parking_lot::Mutex<FftPlanner<f64>>,
}

struct Plans {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl AdaptiveNotch {
    pub fn new(sample_rate: f64, outlier_factor: f64) -> Self {
        Self {
            sample_rate,
            outlier_factor,
            subwindow: ((NOTCH_SUBWINDOW_SECONDS * sample_rate).round() as usize).max(MIN_SUBWINDOW_SAMPLES),
            planner: parking_lot::Mutex::new(FftPlanner::new()),
        }
    }

    fn plans(&self, len: usize) -> Plans {
        let mut planner = self.planner.lock();
        Plans {
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    /// Remove line interference from every channel of the block
    pub fn apply(&self, block: &mut Array2<f64>) {
        let samples = block.ncols();
        if samples < MIN_SUBWINDOW_SAMPLES {
            return;
        }
        let full = self.plans(self.subwindow);
        let remainder = samples % self.subwindow;
        let tail = (remainder >= MIN_SUBWINDOW_SAMPLES).then(|| self.plans(remainder));

        block.axis_iter_mut(Axis(0)).into_par_iter().for_each(|mut row| {
            let mut channel = row.to_vec();
            for chunk in channel.chunks_mut(self.subwindow) {
                if chunk.len() == self.subwindow {
                    self.clean_chunk(chunk, &full);
                } else if let Some(plans) = &tail {
                    self.clean_chunk(chunk, plans);
                }
            }
            for (dst, src) in row.iter_mut().zip(channel) {
                *dst = src;
            }
        });
    }

    fn clean_chunk(&self, chunk: &mut [f64], plans: &Plans) {
        let len = chunk.len();
        let mut spectrum: Vec<Complex64> = chunk.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        plans.forward.process(&mut spectrum);

        let outliers = self.outlier_bins(&spectrum, len);
        if outliers.is_empty() {
            return;
        }

        let mut interference = vec![Complex64::new(0.0, 0.0); len];
        for k in outliers {
            interference[k] = spectrum[k];
            interference[len - k] = spectrum[len - k];
        }
        plans.inverse.process(&mut interference);

        let scale = 1.0 / len as f64;
        for (v, c) in chunk.iter_mut().zip(interference) {
            *v -= c.re * scale;
        }
    }

    /// Positive-frequency bins (excluding DC and Nyquist) flagged as interference
    fn outlier_bins(&self, spectrum: &[Complex64], len: usize) -> Vec<usize> {
        let half = (len - 1) / 2;
        let magnitudes: Vec<f64> = spectrum[..=half].iter().map(|c| c.norm()).collect();
        let radius = ((NOTCH_NEIGHBOURHOOD_HZ * len as f64 / self.sample_rate).round() as usize).max(1);

        (1..=half)
            .filter(|&k| {
                let lo = k.saturating_sub(radius).max(1);
                let hi = (k + radius).min(half);
                let neighbourhood = &magnitudes[lo..=hi];
                let centre = median(neighbourhood);
                let deviations: Vec<f64> = neighbourhood.iter().map(|m| (m - centre).abs()).collect();
                let spread = MAD_TO_STD * median(&deviations);
                spread > 0.0 && magnitudes[k] > centre + self.outlier_factor * spread
            })
            .collect()
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}
