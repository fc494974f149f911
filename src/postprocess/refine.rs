// src/postprocess/refine.rs
//! Filter re-estimation from confirmed discharge times
//!
//! The refreshed filter is the sum of the extended raw-data columns at the
//! unit's discharges. Projecting it through the reduced-rank inverse
//! covariance of the whole recording gives the CKC pulse train
//! `cᵀ C⁺ x(t)`, which is then re-detected and cleaned of rate outliers.
//! A unit whose refined pulse train scores below the SIL acceptance threshold
//! is dropped.

use super::duplicates::DuplicateRemover;
use super::outliers::{OutlierRemover, OutlierReport};
use crate::config::DecompositionConfig;
use crate::error::{DecompError, DecompErrorBuilder, DecompResult, ProcessingStage};
use crate::processing::extension::{demean, extend, extension_factor};
use crate::processing::whitening::whiten;
use crate::segmentation::AnalysisWindow;
use crate::separation::{silhouette, SpikeDetector};
use crate::session::result::MotorUnit;
use crate::utils::isi_cov;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// Extended grid data and its inverse covariance, shared by all units of a grid
#[derive(Debug, Clone)]
pub struct RefineBasis {
    pub extended: Array2<f64>,
    pub inverse_covariance: Array2<f64>,
    pub extension_factor: usize,
}

impl RefineBasis {
    pub fn samples(&self) -> usize {
        self.extended.ncols()
    }
}

/// What refinement did to one unit
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    pub kept: bool,
    /// SIL of the refreshed pulse train, when any discharge was found
    pub sil: Option<f64>,
    pub discharges_before: usize,
    pub discharges_after: usize,
    pub outliers: Option<OutlierReport>,
}

pub struct Refiner {
    detector: SpikeDetector,
    outliers: OutlierRemover,
    duplicates: DuplicateRemover,
    sil_threshold: f64,
    extended_target: usize,
}

impl Refiner {
    pub fn new(config: &DecompositionConfig, sample_rate: f64) -> Self {
        Self {
            detector: SpikeDetector::from_seconds(
                sample_rate,
                config.separation.aggregation_peak_distance_seconds,
                config.separation.discharge_outlier_sigma,
                config.seed,
            ),
            outliers: OutlierRemover::new(&config.outliers, sample_rate),
            duplicates: DuplicateRemover::within_grid(config, sample_rate),
            sil_threshold: config.sil_threshold,
            extended_target: config.extended_channels,
        }
    }

    /// Extend, de-mean and whiten a grid's active-channel recording
    pub fn prepare(&self, raw_grid: &Array2<f64>) -> DecompResult<RefineBasis> {
        let channels = raw_grid.nrows();
        if channels == 0 {
            return Err(DecompErrorBuilder::new("refine", "prepare")
                .invalid_data("channel block", "no active channels after rejection"));
        }
        let factor = extension_factor(self.extended_target, channels);
        let mut extended = extend(raw_grid, factor);
        demean(&mut extended);
        let whitening = whiten(&extended)
            .map_err(|e| DecompError::numeric(ProcessingStage::Refinement, "refine", e.to_string()))?;

        debug!(channels, factor, rank = whitening.rank, "Refinement basis prepared");
        Ok(RefineBasis {
            inverse_covariance: whitening.inverse_covariance(),
            extended,
            extension_factor: factor,
        })
    }

    /// Refreshed pulse train for a discharge set, sign-squared, zeroed in the
    /// extension start-up regions and outside `windows`
    pub fn pulse_train(&self, basis: &RefineBasis, discharges: &[usize], windows: &[AnalysisWindow]) -> Vec<f64> {
        let samples = basis.samples();
        let projected = basis.inverse_covariance.dot(&discharge_sum(basis, discharges));
        let mut pulse: Vec<f64> = projected.dot(&basis.extended).iter().map(|&v| v * v.abs()).collect();

        let edge = (2 * basis.extension_factor).min(samples);
        pulse[..edge].iter_mut().for_each(|v| *v = 0.0);
        pulse[samples - edge..].iter_mut().for_each(|v| *v = 0.0);

        if !windows.is_empty() {
            let mut inside = vec![false; samples];
            for window in windows {
                let end = window.end.min(samples);
                inside[window.start.min(end)..end].iter_mut().for_each(|v| *v = true);
            }
            for (v, keep) in pulse.iter_mut().zip(inside) {
                if !keep {
                    *v = 0.0;
                }
            }
        }
        pulse
    }

    /// Re-estimate one unit in place; `kept` is false when no discharge
    /// survives or the refreshed SIL misses the threshold, and the unit is then
    /// left untouched
    pub fn refine(&self, basis: &RefineBasis, unit: &mut MotorUnit, windows: &[AnalysisWindow]) -> RefineOutcome {
        let before = unit.discharges.len();
        let pulse = self.pulse_train(basis, &unit.discharges, windows);
        let filter = discharge_sum(basis, &unit.discharges);

        let detection = self.detector.detect(pulse);
        if detection.discharges.is_empty() {
            debug!(grid = unit.grid, "Refinement left no discharges");
            return RefineOutcome {
                kept: false,
                sil: None,
                discharges_before: before,
                discharges_after: 0,
                outliers: None,
            };
        }

        let sil = silhouette(&detection);
        if sil < self.sil_threshold {
            debug!(grid = unit.grid, sil, "Refinement below SIL threshold, unit dropped");
            return RefineOutcome {
                kept: false,
                sil: Some(sil),
                discharges_before: before,
                discharges_after: 0,
                outliers: None,
            };
        }

        let mut discharges = detection.discharges;
        let report = self.outliers.clean(&mut discharges, &detection.pulse_train);

        unit.sil = sil;
        unit.cov = isi_cov(&discharges);
        unit.discharges = discharges;
        unit.pulse_train = detection.pulse_train;
        unit.filter = filter.to_vec();

        RefineOutcome {
            kept: true,
            sil: Some(sil),
            discharges_before: before,
            discharges_after: unit.discharges.len(),
            outliers: Some(report),
        }
    }

    /// Refine every unit of a grid, then collapse units that converged onto
    /// the same discharge train
    pub fn refine_all(&self, basis: &RefineBasis, mut units: Vec<MotorUnit>, windows: &[AnalysisWindow]) -> Vec<MotorUnit> {
        units.retain_mut(|unit| self.refine(basis, unit, windows).kept);
        let refined = units.len();
        let units = self.duplicates.remove(units);
        debug!(refined, survivors = units.len(), "Duplicates removed after refinement");
        units
    }
}

/// Sum of the extended columns at the given discharges
fn discharge_sum(basis: &RefineBasis, discharges: &[usize]) -> Array1<f64> {
    let mut sum = Array1::<f64>::zeros(basis.extended.nrows());
    for &d in discharges.iter().filter(|&&d| d < basis.samples()) {
        sum += &basis.extended.index_axis(Axis(1), d);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::synthetic::standard_normal;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const FS: f64 = 2048.0;

    fn recording(samples: usize, period: usize) -> (Array2<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(21);
        let gains = [1.0, 0.6, 0.4, 0.2];
        let truth: Vec<usize> = (0..).map(|k| 100 + k * period).take_while(|&t| t < samples - 100).collect();
        let mut data = Array2::from_shape_fn((4, samples), |_| standard_normal(&mut rng));
        for &t in &truth {
            for (ch, gain) in gains.iter().enumerate() {
                data[[ch, t]] += 8.0 * gain;
            }
        }
        (data, truth)
    }

    fn config(sil_threshold: f64) -> DecompositionConfig {
        DecompositionConfig {
            extended_channels: 4,
            sil_threshold,
            ..DecompositionConfig::default()
        }
    }

    fn refiner() -> Refiner {
        Refiner::new(&config(0.5), FS)
    }

    fn unit(discharges: Vec<usize>) -> MotorUnit {
        MotorUnit {
            grid: 0,
            pulse_train: vec![],
            cov: isi_cov(&discharges),
            discharges,
            sil: 0.9,
            filter: vec![],
            source_window: 0,
        }
    }

    #[test]
    fn test_refine_recovers_true_discharges() {
        let (data, truth) = recording(10_000, 205);
        let refiner = refiner();
        let basis = refiner.prepare(&data).unwrap();
        assert_eq!(basis.extension_factor, 1);

        let mut initial: Vec<usize> = truth.iter().copied().filter(|t| (t / 205) % 9 != 4).collect();
        initial.extend([1234, 5551, 8020]);
        initial.sort_unstable();
        let mut mu = unit(initial);

        let windows = [AnalysisWindow::new(0, 10_000)];
        let outcome = refiner.refine(&basis, &mut mu, &windows);
        assert!(outcome.kept);
        assert!(outcome.sil.is_some_and(|sil| sil >= 0.5));
        assert!(!mu.discharges.contains(&1234));
        assert!(!mu.discharges.contains(&5551));
        let recovered = mu.discharges.iter().filter(|d| truth.contains(d)).count();
        assert!(recovered + 2 >= truth.len(), "recovered {recovered} of {}", truth.len());
        assert_eq!(mu.pulse_train.len(), 10_000);
        assert_eq!(mu.filter.len(), 4);
        assert!(mu.sil > 0.5);
    }

    #[test]
    fn test_pulse_masked_outside_windows() {
        let (data, truth) = recording(6000, 205);
        let refiner = refiner();
        let basis = refiner.prepare(&data).unwrap();
        let windows = [AnalysisWindow::new(1000, 5000)];

        let pulse = refiner.pulse_train(&basis, &truth, &windows);
        assert!(pulse[..1000].iter().all(|&v| v == 0.0));
        assert!(pulse[5000..].iter().all(|&v| v == 0.0));
        assert!(pulse[1000..5000].iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_unit_without_discharges_is_dropped() {
        let (data, _) = recording(4000, 205);
        let refiner = refiner();
        let basis = refiner.prepare(&data).unwrap();
        let outcome = refiner.refine(&basis, &mut unit(vec![]), &[]);
        assert!(!outcome.kept);
        assert_eq!(outcome.discharges_after, 0);
    }

    #[test]
    fn test_refinement_below_sil_threshold_drops_unit() {
        let (data, truth) = recording(10_000, 205);
        let strict = Refiner::new(&config(1.0), FS);
        let basis = strict.prepare(&data).unwrap();

        let mut initial = truth.clone();
        initial.push(9_990);
        let mut mu = unit(initial.clone());
        let outcome = strict.refine(&basis, &mut mu, &[AnalysisWindow::new(0, 10_000)]);

        assert!(!outcome.kept);
        assert!(outcome.sil.is_some_and(|sil| sil < 1.0));
        assert_eq!(mu.discharges, initial);
        assert_eq!(mu.sil, 0.9);
        assert!(mu.pulse_train.is_empty());
    }

    #[test]
    fn test_units_converging_on_one_train_collapse() {
        let (data, truth) = recording(10_000, 205);
        let refiner = refiner();
        let basis = refiner.prepare(&data).unwrap();

        let early: Vec<usize> = truth.iter().copied().filter(|&t| t < 5000).collect();
        let late: Vec<usize> = truth.iter().copied().filter(|&t| t >= 5000).collect();
        let remover = DuplicateRemover::within_grid(&config(0.5), FS);
        assert!(!remover.is_duplicate(&unit(early.clone()), &unit(late.clone())));

        let units = refiner.refine_all(&basis, vec![unit(early), unit(late)], &[AnalysisWindow::new(0, 10_000)]);
        assert_eq!(units.len(), 1);
        let recovered = units[0].discharges.iter().filter(|d| truth.contains(d)).count();
        assert!(recovered + 2 >= truth.len(), "recovered {recovered} of {}", truth.len());
    }

    #[test]
    fn test_empty_grid_cannot_be_prepared() {
        assert!(refiner().prepare(&Array2::zeros((0, 100))).is_err());
    }

    #[test]
    fn test_flat_grid_is_a_refinement_error() {
        let err = refiner().prepare(&Array2::zeros((4, 500))).unwrap_err();
        assert!(matches!(err, DecompError::Numeric { stage: ProcessingStage::Refinement, .. }));
        assert!(err.is_recoverable());
    }
}
