// src/separation/spikes.rs
//! Pulse trains and discharge detection

use super::clustering::{two_means, TwoClusters};
use crate::config::constants::separation::TOP_PEAKS_FOR_NORMALISATION;
use crate::utils::{mean, mean_of_top, std_dev};
use ndarray::{Array1, Array2};

/// `s = (wᵀZ)·|wᵀZ|`
pub fn pulse_train(w: &Array1<f64>, whitened: &Array2<f64>) -> Vec<f64> {
    w.dot(whitened).iter().map(|&v| v * v.abs()).collect()
}

/// Local maxima at least `min_distance` samples apart, higher peaks winning.
///
/// Flat-topped maxima report their first sample; the end samples are never peaks.
pub fn find_peaks(signal: &[f64], min_distance: usize) -> Vec<usize> {
    let n = signal.len();
    let mut peaks = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if signal[i] > signal[i - 1] {
            let mut j = i;
            while j + 1 < n && signal[j + 1] == signal[i] {
                j += 1;
            }
            if j + 1 < n && signal[j + 1] < signal[i] {
                peaks.push(i);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    if min_distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| signal[peaks[b]].total_cmp(&signal[peaks[a]]).then(a.cmp(&b)));
    let mut removed = vec![false; peaks.len()];
    for &p in &order {
        if removed[p] {
            continue;
        }
        let mut k = p;
        while k > 0 && peaks[p] - peaks[k - 1] < min_distance {
            removed[k - 1] = true;
            k -= 1;
        }
        let mut k = p + 1;
        while k < peaks.len() && peaks[k] - peaks[p] < min_distance {
            removed[k] = true;
            k += 1;
        }
    }

    peaks
        .into_iter()
        .zip(removed)
        .filter(|(_, r)| !r)
        .map(|(p, _)| p)
        .collect()
}

/// Outcome of one detection pass over a pulse train
#[derive(Debug, Clone)]
pub struct Detection {
    /// Pulse train scaled by the mean of its largest peaks
    pub pulse_train: Vec<f64>,
    pub peaks: Vec<usize>,
    pub clusters: Option<TwoClusters>,
    /// Strictly increasing discharge indices into `pulse_train`
    pub discharges: Vec<usize>,
}

impl Detection {
    /// Normalised heights of all peaks
    pub fn peak_heights(&self) -> Vec<f64> {
        self.peaks.iter().map(|&p| self.pulse_train[p]).collect()
    }
}

/// Peak picking plus two-cluster discharge classification
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    min_distance: usize,
    outlier_sigma: f64,
    seed: u64,
}

impl SpikeDetector {
    pub fn new(min_distance: usize, outlier_sigma: f64, seed: u64) -> Self {
        Self {
            min_distance: min_distance.max(1),
            outlier_sigma,
            seed,
        }
    }

    pub fn from_seconds(sample_rate: f64, distance_seconds: f64, outlier_sigma: f64, seed: u64) -> Self {
        Self::new((distance_seconds * sample_rate).round() as usize, outlier_sigma, seed)
    }

    pub fn min_distance(&self) -> usize {
        self.min_distance
    }

    /// Detect discharges in a sign-squared pulse train
    pub fn detect(&self, mut pulse: Vec<f64>) -> Detection {
        let peaks = find_peaks(&pulse, self.min_distance);
        let raw_heights: Vec<f64> = peaks.iter().map(|&p| pulse[p]).collect();
        if let Some(scale) = mean_of_top(&raw_heights, TOP_PEAKS_FOR_NORMALISATION) {
            if scale.is_finite() && scale > 0.0 {
                pulse.iter_mut().for_each(|v| *v /= scale);
            }
        }

        let heights: Vec<f64> = peaks.iter().map(|&p| pulse[p]).collect();
        let clusters = two_means(&heights, self.seed);

        let discharges = match &clusters {
            Some(c) => {
                let members: Vec<usize> = peaks
                    .iter()
                    .zip(&c.high)
                    .filter(|(_, &high)| high)
                    .map(|(&p, _)| p)
                    .collect();
                self.drop_amplitude_outliers(&pulse, members)
            }
            None => Vec::new(),
        };

        Detection {
            pulse_train: pulse,
            peaks,
            clusters,
            discharges,
        }
    }

    /// Remove discharges far above the discharge cluster's typical height
    fn drop_amplitude_outliers(&self, pulse: &[f64], discharges: Vec<usize>) -> Vec<usize> {
        let heights: Vec<f64> = discharges.iter().map(|&d| pulse[d]).collect();
        if heights.len() < 2 {
            return discharges;
        }
        let limit = mean(&heights) + self.outlier_sigma * std_dev(&heights);
        discharges.into_iter().filter(|&d| pulse[d] <= limit).collect()
    }
}
