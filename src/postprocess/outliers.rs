// src/postprocess/outliers.rs
//! Removal of discharges implying implausible instantaneous rates

use crate::config::OutlierConfig;
use crate::utils::{coefficient_of_variation, discharge_rates, mean, std_dev};
use tracing::trace;

/// What one outlier-removal run did
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    pub passes: usize,
    pub removed: usize,
    pub initial_cov: f64,
    pub final_cov: f64,
}

#[derive(Debug, Clone)]
pub struct OutlierRemover {
    cov_threshold: f64,
    max_iterations: usize,
    rate_sigma: f64,
    sample_rate: f64,
}

impl OutlierRemover {
    pub fn new(config: &OutlierConfig, sample_rate: f64) -> Self {
        Self {
            cov_threshold: config.cov_threshold,
            max_iterations: config.max_iterations,
            rate_sigma: config.rate_sigma,
            sample_rate,
        }
    }

    fn rate_cov(&self, discharges: &[usize]) -> f64 {
        coefficient_of_variation(&discharge_rates(discharges, self.sample_rate))
    }

    /// Prune `discharges` in place.
    ///
    /// Each pass finds rates above mean + σ·std and deletes, for each, the
    /// bounding discharge with the smaller pulse-train value. A pass that would
    /// raise the rate CoV is discarded and ends the loop.
    pub fn clean(&self, discharges: &mut Vec<usize>, pulse_train: &[f64]) -> OutlierReport {
        let initial_cov = self.rate_cov(discharges);
        let initial_len = discharges.len();
        let mut cov = initial_cov;
        let mut passes = 0;

        while cov > self.cov_threshold && passes < self.max_iterations {
            passes += 1;
            let rates = discharge_rates(discharges, self.sample_rate);
            let limit = mean(&rates) + self.rate_sigma * std_dev(&rates);

            let mut drop = vec![false; discharges.len()];
            for (i, &rate) in rates.iter().enumerate() {
                if rate <= limit {
                    continue;
                }
                let left = pulse_train.get(discharges[i]).copied().unwrap_or(0.0);
                let right = pulse_train.get(discharges[i + 1]).copied().unwrap_or(0.0);
                if left < right {
                    drop[i] = true;
                } else {
                    drop[i + 1] = true;
                }
            }
            if !drop.iter().any(|&d| d) {
                break;
            }

            let candidate: Vec<usize> = discharges
                .iter()
                .zip(&drop)
                .filter(|(_, &d)| !d)
                .map(|(&t, _)| t)
                .collect();
            let candidate_cov = self.rate_cov(&candidate);
            trace!(pass = passes, cov, candidate_cov, "Outlier pass");
            if !(candidate_cov <= cov) {
                break;
            }
            *discharges = candidate;
            cov = candidate_cov;
        }

        OutlierReport {
            passes,
            removed: initial_len - discharges.len(),
            initial_cov,
            final_cov: cov,
        }
    }
}
