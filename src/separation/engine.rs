// src/separation/engine.rs
//! Separation engine: one deflationary search per iteration over a whitened block

use super::fixed_point::{FixedPoint, SeparationBasis};
use super::peeloff::peel_off;
use super::quality::silhouette;
use super::regularity::minimize_cov;
use super::spikes::SpikeDetector;
use crate::config::{DecompositionConfig, Initialization};
use crate::error::{DecompError, DecompResult};
use crate::processing::WhitenedBlock;
use crate::session::observer::{Observers, PlotFrame, ProgressEvent};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

/// A separation outcome that passed the acceptance thresholds
#[derive(Debug, Clone)]
pub struct CandidateUnit {
    pub window_index: usize,
    /// Separation vector in the whitened space
    pub w: Array1<f64>,
    /// CKC filter in the extended space, `dewhitening · w`
    pub filter: Array1<f64>,
    /// Normalised pulse train over the window
    pub pulse_train: Vec<f64>,
    /// Discharges relative to the window start
    pub discharges: Vec<usize>,
    pub sil: f64,
    pub cov: f64,
}

/// Where a block sits within the run, for notifications
#[derive(Debug, Clone, Copy)]
pub struct BlockContext<'a> {
    pub grid: usize,
    pub sample_rate: f64,
    pub reference: Option<&'a [f64]>,
}

pub struct SeparationEngine {
    iterations: usize,
    initialization: Initialization,
    fixed_point: FixedPoint,
    detector: SpikeDetector,
    sil_threshold: f64,
    cov_threshold: f64,
    cov_filter: bool,
    peeloff_half_window: Option<usize>,
    seed: u64,
}

impl SeparationEngine {
    pub fn new(config: &DecompositionConfig, sample_rate: f64) -> Self {
        let tuning = &config.separation;
        Self {
            iterations: config.iterations,
            initialization: config.initialization,
            fixed_point: FixedPoint {
                contrast: config.contrast_function,
                max_iterations: tuning.max_fixed_point_iterations,
                tolerance: tuning.fixed_point_tolerance,
            },
            detector: SpikeDetector::from_seconds(
                sample_rate,
                tuning.peak_distance_seconds,
                tuning.discharge_outlier_sigma,
                config.seed,
            ),
            sil_threshold: config.sil_threshold,
            cov_threshold: config.cov_threshold,
            cov_filter: config.cov_filter,
            peeloff_half_window: config
                .peeloff
                .then(|| (tuning.peeloff_half_window_seconds * sample_rate).round() as usize),
            seed: config.seed,
        }
    }

    fn accepts(&self, sil: f64, cov: f64) -> bool {
        sil >= self.sil_threshold && (!self.cov_filter || cov <= self.cov_threshold)
    }

    /// Run every iteration over one whitened block and return the accepted units
    pub fn separate(
        &self,
        block: &WhitenedBlock,
        context: BlockContext<'_>,
        observers: &Observers,
    ) -> DecompResult<Vec<CandidateUnit>> {
        let dim = block.extended_channels();
        let mut residual = block.whitened.clone();
        let mut basis = SeparationBasis::new();
        let mut accepted = Vec::new();
        let seeds = match self.initialization {
            Initialization::EnergyBased => spaced_seeds(
                &energy_ranking(&block.whitened),
                self.detector.min_distance(),
                self.iterations,
            ),
            Initialization::Random => Vec::new(),
        };
        let mut rng = StdRng::seed_from_u64(
            self.seed ^ ((context.grid as u64) << 32) ^ block.window_index as u64,
        );

        for iteration in 0..self.iterations {
            if observers.cancel.is_cancelled() {
                return Err(DecompError::Cancelled);
            }

            let initial = match self.initialization {
                Initialization::EnergyBased if !seeds.is_empty() => {
                    residual.column(seeds[iteration % seeds.len()]).to_owned()
                }
                _ => Array1::from_shape_fn(dim, |_| rng.gen_range(-1.0..1.0)),
            };

            let Some(search) = self.fixed_point.run(initial, &residual, &basis) else {
                debug!(grid = context.grid, window = block.window_index, iteration, "Separation vector collapsed");
                continue;
            };
            trace!(iteration, steps = search.iterations, converged = search.converged, "Fixed point");

            let outcome = minimize_cov(search.w, &residual, &self.detector);
            if outcome.detection.discharges.len() < 2 {
                debug!(
                    grid = context.grid,
                    window = block.window_index,
                    iteration,
                    "Fewer than two discharges, candidate skipped"
                );
                continue;
            }

            let sil = silhouette(&outcome.detection);
            let cov = outcome.cov;
            let is_accepted = self.accepts(sil, cov);

            observers.emit(ProgressEvent::Iteration {
                grid: context.grid,
                window: block.window_index,
                iteration,
                iterations: self.iterations,
                sil,
                cov,
                accepted: is_accepted,
            });
            if observers.plot.wants_frames() {
                observers.plot.on_frame(plot_frame(block, &context, iteration, &outcome.detection.pulse_train, &outcome.detection.discharges, sil, cov));
            }

            if !is_accepted {
                continue;
            }
            basis.push(&outcome.w);
            if let Some(half_window) = self.peeloff_half_window {
                peel_off(&mut residual, &outcome.detection.discharges, half_window);
            }
            debug!(grid = context.grid, window = block.window_index, iteration, sil, cov, "Candidate accepted");

            accepted.push(CandidateUnit {
                window_index: block.window_index,
                filter: block.dewhitening.dot(&outcome.w),
                w: outcome.w,
                pulse_train: outcome.detection.pulse_train,
                discharges: outcome.detection.discharges,
                sil,
                cov,
            });
        }

        Ok(accepted)
    }
}

/// Column indices ordered by energy (sum of squares over channels), largest first
pub fn energy_ranking(whitened: &Array2<f64>) -> Vec<usize> {
    let energy = whitened.mapv(|v| v * v).sum_axis(Axis(0));
    let mut order: Vec<usize> = (0..energy.len()).collect();
    order.sort_by(|&a, &b| energy[b].total_cmp(&energy[a]).then(a.cmp(&b)));
    order
}

/// Up to `count` columns from `ranking`, each more than `spacing` samples from
/// every column already taken, so one discharge seeds at most one iteration
pub fn spaced_seeds(ranking: &[usize], spacing: usize, count: usize) -> Vec<usize> {
    let mut taken: Vec<usize> = Vec::with_capacity(count);
    for &column in ranking {
        if taken.len() == count {
            break;
        }
        if taken.iter().all(|&t| t.abs_diff(column) > spacing) {
            taken.push(column);
        }
    }
    taken
}

fn plot_frame(
    block: &WhitenedBlock,
    context: &BlockContext<'_>,
    iteration: usize,
    pulse_train: &[f64],
    discharges: &[usize],
    sil: f64,
    cov: f64,
) -> PlotFrame {
    let window = block.window;
    PlotFrame {
        grid: context.grid,
        window: block.window_index,
        iteration,
        time_axis: window.range().map(|t| t as f64 / context.sample_rate).collect(),
        reference: context
            .reference
            .and_then(|r| r.get(window.start..window.end))
            .map(<[f64]>::to_vec),
        window_bounds: window,
        pulse_train: pulse_train.to_vec(),
        discharges: discharges.iter().map(|d| d + window.start).collect(),
        sil,
        cov,
    }
}
