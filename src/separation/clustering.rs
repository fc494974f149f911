// src/separation/clustering.rs
//! Seeded one-dimensional two-means partitioning of peak amplitudes

use crate::config::constants::separation::{KMEANS_MAX_ITERATIONS, KMEANS_RESTARTS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Result of splitting values into a low (noise) and a high (discharge) cluster
#[derive(Debug, Clone, PartialEq)]
pub struct TwoClusters {
    /// `true` for members of the high-centroid cluster
    pub high: Vec<bool>,
    pub low_centroid: f64,
    pub high_centroid: f64,
    pub inertia: f64,
}

impl TwoClusters {
    pub fn high_count(&self) -> usize {
        self.high.iter().filter(|&&h| h).count()
    }
}

/// Two-means with k-means++ seeding; the lowest-inertia restart wins.
///
/// Returns `None` for fewer than two values or when all values are equal.
pub fn two_means(values: &[f64], seed: u64) -> Option<TwoClusters> {
    if values.len() < 2 {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > min) {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<TwoClusters> = None;
    for _ in 0..KMEANS_RESTARTS {
        let (a, b) = plus_plus_seeds(values, &mut rng);
        let candidate = lloyd(values, a.min(b), a.max(b));
        if best.as_ref().map_or(true, |current| candidate.inertia < current.inertia) {
            best = Some(candidate);
        }
    }
    best
}

fn plus_plus_seeds(values: &[f64], rng: &mut StdRng) -> (f64, f64) {
    let first = values[rng.gen_range(0..values.len())];
    let weights: Vec<f64> = values.iter().map(|v| (v - first).powi(2)).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return (first, first);
    }
    let mut target = rng.gen_range(0.0..total);
    for (value, weight) in values.iter().zip(&weights) {
        if target < *weight {
            return (first, *value);
        }
        target -= weight;
    }
    (first, values[values.len() - 1])
}

fn lloyd(values: &[f64], mut low: f64, mut high: f64) -> TwoClusters {
    let mut labels = vec![false; values.len()];
    for _ in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for (label, &v) in labels.iter_mut().zip(values) {
            let is_high = (v - high).abs() < (v - low).abs();
            if *label != is_high {
                *label = is_high;
                changed = true;
            }
        }

        let (mut sum_low, mut n_low, mut sum_high, mut n_high) = (0.0, 0usize, 0.0, 0usize);
        for (&is_high, &v) in labels.iter().zip(values) {
            if is_high {
                sum_high += v;
                n_high += 1;
            } else {
                sum_low += v;
                n_low += 1;
            }
        }
        if n_low > 0 {
            low = sum_low / n_low as f64;
        }
        if n_high > 0 {
            high = sum_high / n_high as f64;
        }
        if !changed {
            break;
        }
    }

    if high < low {
        std::mem::swap(&mut high, &mut low);
        labels.iter_mut().for_each(|l| *l = !*l);
    }
    let inertia = labels
        .iter()
        .zip(values)
        .map(|(&is_high, &v)| if is_high { (v - high).powi(2) } else { (v - low).powi(2) })
        .sum();

    TwoClusters {
        high: labels,
        low_centroid: low,
        high_centroid: high,
        inertia,
    }
}
