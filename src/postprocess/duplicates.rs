// src/postprocess/duplicates.rs
//! Duplicate motor-unit removal within a grid and across grids
//!
//! Two units are duplicates when, after aligning their binary discharge
//! trains by the best cross-correlation lag, enough discharges coincide within
//! a small jitter. Of each duplicate group only the most regular unit (lowest
//! inter-discharge CoV) survives.

use crate::config::DecompositionConfig;
use crate::session::result::MotorUnit;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DuplicateRemover {
    jitter: usize,
    max_lag: usize,
    correlation_gate: f64,
    threshold: f64,
}

impl DuplicateRemover {
    pub fn new(jitter: usize, max_lag: usize, correlation_gate: f64, threshold: f64) -> Self {
        Self {
            jitter,
            max_lag,
            correlation_gate,
            threshold,
        }
    }

    /// Intra-grid remover from the configured threshold
    pub fn within_grid(config: &DecompositionConfig, sample_rate: f64) -> Self {
        Self::from_config(config, sample_rate, config.duplicates_threshold)
    }

    /// Inter-grid remover from the configured between-grids threshold
    pub fn between_grids(config: &DecompositionConfig, sample_rate: f64) -> Self {
        Self::from_config(config, sample_rate, config.duplicates.between_grids_threshold)
    }

    fn from_config(config: &DecompositionConfig, sample_rate: f64, threshold: f64) -> Self {
        let d = &config.duplicates;
        Self::new(
            ((d.jitter_seconds * sample_rate).round() as usize).max(1),
            (sample_rate / d.max_lag_divisor).round() as usize,
            d.correlation_gate,
            threshold,
        )
    }

    /// Lag (`b` relative to `a`, in samples) maximising the normalised
    /// cross-correlation of the binary trains, if it clears the gate
    pub fn best_lag(&self, a: &[usize], b: &[usize]) -> Option<i64> {
        if a.is_empty() || b.is_empty() {
            return None;
        }
        let width = 2 * self.max_lag + 1;
        let mut counts = vec![0usize; width];
        for &da in a {
            let lo = da.saturating_sub(self.max_lag);
            let start = b.partition_point(|&x| x < lo);
            for &db in b[start..].iter().take_while(|&&x| x <= da + self.max_lag) {
                let lag = db as i64 - da as i64 + self.max_lag as i64;
                counts[lag as usize] += 1;
            }
        }

        let norm = ((a.len() * b.len()) as f64).sqrt();
        let (best, &count) = counts.iter().enumerate().max_by(|x, y| x.1.cmp(y.1).then(y.0.cmp(&x.0)))?;
        let correlation = count as f64 / norm;
        (correlation > self.correlation_gate).then(|| best as i64 - self.max_lag as i64)
    }

    /// Fraction of common discharges relative to the larger discharge count
    pub fn common_fraction(&self, a: &[usize], b: &[usize]) -> f64 {
        let larger = a.len().max(b.len());
        if larger == 0 {
            return 0.0;
        }
        let lag = self.best_lag(a, b).unwrap_or(0);
        let jitter = self.jitter as i64;

        let jittered_a = jittered(a.iter().map(|&d| d as i64), jitter);
        let jittered_b = jittered(b.iter().map(|&d| d as i64 - lag), jitter);

        let mut common = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < jittered_a.len() && j < jittered_b.len() {
            match jittered_a[i].cmp(&jittered_b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    common.push(jittered_a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        // keep one index per contiguous run
        let count = common.windows(2).filter(|w| w[1] - w[0] != 1).count() + usize::from(!common.is_empty());

        count as f64 / larger as f64
    }

    /// Duplicates share strictly more than the threshold fraction of discharges
    pub fn is_duplicate(&self, a: &MotorUnit, b: &MotorUnit) -> bool {
        self.common_fraction(&a.discharges, &b.discharges) > self.threshold
    }

    /// Remove duplicates among units of one grid
    pub fn remove(&self, units: Vec<MotorUnit>) -> Vec<MotorUnit> {
        self.remove_until_stable(units, false)
    }

    /// Remove duplicates across grids; pairs from the same grid are never compared
    pub fn remove_between_grids(&self, units: Vec<MotorUnit>) -> Vec<MotorUnit> {
        self.remove_until_stable(units, true)
    }

    fn remove_until_stable(&self, mut units: Vec<MotorUnit>, skip_same_grid: bool) -> Vec<MotorUnit> {
        loop {
            let before = units.len();
            units = self.single_pass(units, skip_same_grid);
            if units.len() == before {
                return units;
            }
        }
    }

    fn single_pass(&self, units: Vec<MotorUnit>, skip_same_grid: bool) -> Vec<MotorUnit> {
        let mut removed = vec![false; units.len()];
        for i in 0..units.len() {
            if removed[i] {
                continue;
            }
            let mut group = vec![i];
            for j in (i + 1)..units.len() {
                if removed[j] || (skip_same_grid && units[i].grid == units[j].grid) {
                    continue;
                }
                if self.is_duplicate(&units[i], &units[j]) {
                    group.push(j);
                }
            }
            if group.len() < 2 {
                continue;
            }

            let survivor = group
                .iter()
                .copied()
                .min_by(|&x, &y| units[x].ranking_cov().total_cmp(&units[y].ranking_cov()).then(x.cmp(&y)))
                .unwrap_or(i);
            for &member in &group {
                if member != survivor {
                    removed[member] = true;
                }
            }
            debug!(group = ?group, survivor, "Duplicate group collapsed");
        }

        units
            .into_iter()
            .zip(removed)
            .filter(|(_, r)| !r)
            .map(|(u, _)| u)
            .collect()
    }
}

/// Sorted, de-duplicated union of `[d - jitter, d + jitter]` around each discharge
fn jittered(discharges: impl Iterator<Item = i64>, jitter: i64) -> Vec<i64> {
    let mut out: Vec<i64> = discharges.flat_map(|d| (d - jitter)..=(d + jitter)).collect();
    out.sort_unstable();
    out.dedup();
    out
}
