// src/session/mod.rs
//! Decomposition session: the top-level control loop
//!
//! A session owns the signal bundle for one run and moves through
//! `Idle → Preparing → PerGridProcessing → CrossGridProcessing → Done`, or
//! `Failed`. Grids are processed in sequence; each grid's working state lives
//! only inside its processing step and is merged into the result at the end.
//! Units already found stay inspectable after a failure.

pub mod observer;
pub mod result;

pub use observer::{
    CancellationToken, ChannelSink, CollectingSink, NullSink, Observers, PlotFrame, PlotSink, ProgressEvent,
    ProgressSink, TracingSink,
};
pub use result::{DecompositionResult, GridFailure, MotorUnit};

use crate::config::DecompositionConfig;
use crate::error::{DecompError, DecompErrorBuilder, DecompResult};
use crate::postprocess::{Aggregator, DuplicateRemover, OutlierRemover, Refiner};
use crate::processing::Conditioner;
use crate::segmentation::{Segmenter, WindowSet};
use crate::separation::{BlockContext, SeparationEngine, SpikeDetector};
use crate::signal::SignalBundle;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Where a session is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Preparing,
    PerGridProcessing { grid: usize },
    CrossGridProcessing,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

pub struct DecompositionSession {
    bundle: SignalBundle,
    config: DecompositionConfig,
    observers: Observers,
    state: SessionState,
    windows: Option<WindowSet>,
    units: Vec<Vec<MotorUnit>>,
    failures: Vec<GridFailure>,
    failure_reason: Option<String>,
}

impl DecompositionSession {
    /// Validate the configuration and take ownership of the bundle.
    ///
    /// Every configuration violation is reported at once, before any work.
    pub fn new(bundle: SignalBundle, config: DecompositionConfig, observers: Observers) -> DecompResult<Self> {
        if let Err(violations) = config.validate_consistency() {
            return Err(DecompErrorBuilder::new("session", "new").configuration(&violations.join("; ")));
        }
        info!(config = ?config.get_summary(), grids = bundle.grid_count(), "Decomposition session created");

        Ok(Self {
            bundle,
            config,
            observers,
            state: SessionState::Idle,
            windows: None,
            units: Vec::new(),
            failures: Vec::new(),
            failure_reason: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    pub fn bundle(&self) -> &SignalBundle {
        &self.bundle
    }

    /// Analysis windows once segmentation has run
    pub fn windows(&self) -> Option<&WindowSet> {
        self.windows.as_ref()
    }

    /// Units of every grid finished so far
    pub fn partial_results(&self) -> &[Vec<MotorUnit>] {
        &self.units
    }

    pub fn failed_grids(&self) -> &[GridFailure] {
        &self.failures
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Run the whole decomposition. A session runs once.
    pub fn run(&mut self) -> DecompResult<DecompositionResult> {
        if self.state != SessionState::Idle {
            return Err(DecompErrorBuilder::new("session", "run").configuration("a session can only run once"));
        }

        match self.execute() {
            Ok(result) => {
                self.state = SessionState::Done;
                info!(units = result.total_units(), "Decomposition complete");
                self.observers.emit(ProgressEvent::SessionCompleted {
                    units: result.total_units(),
                });
                Ok(result)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                warn!(error = %e, "Decomposition failed");
                self.failure_reason = Some(e.to_string());
                self.observers.emit(ProgressEvent::SessionFailed { reason: e.to_string() });
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> DecompResult<DecompositionResult> {
        self.state = SessionState::Preparing;
        let grids = self.bundle.grid_count();
        let samples = self.bundle.samples();
        self.observers.emit(ProgressEvent::SessionStarted { grids, samples });

        let report = self.bundle.sanitize();
        for message in report.warnings() {
            warn!(%message, "Input sanitised");
            self.observers.emit(ProgressEvent::Warning { message });
        }

        let mut windows = Segmenter::from_config(&self.config).segment(self.bundle.reference(), samples)?;
        if windows.is_empty() {
            return Err(DecompError::NoUsableWindows {
                reason: "segmentation returned no windows".to_string(),
            });
        }
        if let Some(reason) = windows.fallback_reason() {
            self.observers.emit(ProgressEvent::Warning {
                message: format!("Reference unusable ({}), using equal windows", reason),
            });
        }
        self.observers.emit(ProgressEvent::WindowsReady {
            windows: windows.windows().to_vec(),
            mode: windows.mode(),
        });
        self.units = vec![Vec::new(); grids];

        for grid in 0..grids {
            if self.observers.cancel.is_cancelled() {
                return Err(DecompError::Cancelled);
            }
            self.state = SessionState::PerGridProcessing { grid };
            self.observers.emit(ProgressEvent::GridStarted { grid, grids });

            let outcome = self.process_grid(grid, &mut windows);
            self.windows = Some(windows.clone());
            match outcome {
                Ok(units) => {
                    info!(grid, units = units.len(), "Grid complete");
                    self.observers.emit(ProgressEvent::GridCompleted { grid, units: units.len() });
                    self.units[grid] = units;
                }
                Err(DecompError::Cancelled) => return Err(DecompError::Cancelled),
                Err(e) => {
                    warn!(grid, error = %e, "Grid failed");
                    let reason = e.to_string();
                    self.observers.emit(ProgressEvent::GridFailed { grid, reason: reason.clone() });
                    self.failures.push(GridFailure { grid, reason });
                }
            }
        }

        if self.failures.len() == grids {
            return Err(DecompError::AllGridsFailed { grids });
        }

        if self.config.duplicates_between_grids && grids > 1 {
            if self.observers.cancel.is_cancelled() {
                return Err(DecompError::Cancelled);
            }
            self.state = SessionState::CrossGridProcessing;
            self.remove_duplicates_between_grids();
            self.observers.emit(ProgressEvent::CrossGridCompleted {
                units: self.units.iter().map(Vec::len).sum(),
            });
        }

        Ok(DecompositionResult {
            sample_rate: self.bundle.sample_rate(),
            samples,
            grid_count: grids,
            windows: windows.windows().to_vec(),
            units: self.units.clone(),
            failed_grids: self.failures.clone(),
        })
    }

    /// Condition and separate every window of one grid, then post-process
    fn process_grid(&self, grid: usize, windows: &mut WindowSet) -> DecompResult<Vec<MotorUnit>> {
        let config = &self.config;
        let fs = self.bundle.sample_rate();
        let data = self.bundle.grid_block(grid);
        if data.nrows() == 0 {
            return Err(DecompError::GridFailed {
                grid,
                reason: "no active channels after rejection".to_string(),
            });
        }

        let conditioner = Conditioner::new(config, self.bundle.grids()[grid].grid_type, fs)?;
        let engine = SeparationEngine::new(config, fs);
        let context = BlockContext {
            grid,
            sample_rate: fs,
            reference: self.bundle.reference(),
        };

        let mut blocks = Vec::with_capacity(windows.len());
        let mut candidates = Vec::new();
        for index in 0..windows.len() {
            if self.observers.cancel.is_cancelled() {
                return Err(DecompError::Cancelled);
            }
            let block = match conditioner.condition(&data, windows, index) {
                Ok(block) => block,
                Err(e) => {
                    warn!(grid, window = index, error = %e, "Window conditioning failed");
                    self.observers.emit(ProgressEvent::Warning {
                        message: format!("Grid {} window {} skipped: {}", grid + 1, index + 1, e),
                    });
                    continue;
                }
            };
            self.observers.emit(ProgressEvent::WindowConditioned {
                grid,
                window: index,
                windows: windows.len(),
                rank: block.rank,
            });

            let found = engine.separate(&block, context, &self.observers)?;
            debug!(grid, window = index, accepted = found.len(), "Window separated");
            candidates.extend(found);
            blocks.push(block);
        }
        if blocks.is_empty() {
            return Err(DecompError::GridFailed {
                grid,
                reason: "no window could be conditioned".to_string(),
            });
        }

        let detector = SpikeDetector::from_seconds(
            fs,
            config.separation.aggregation_peak_distance_seconds,
            config.separation.discharge_outlier_sigma,
            config.seed,
        );
        let units = Aggregator::new(detector, self.bundle.samples()).aggregate(grid, &candidates, &blocks);
        drop(blocks);

        let mut units = DuplicateRemover::within_grid(config, fs).remove(units);
        debug!(grid, candidates = candidates.len(), units = units.len(), "Duplicates removed");

        let outliers = OutlierRemover::new(&config.outliers, fs);
        for unit in units.iter_mut() {
            let report = outliers.clean(&mut unit.discharges, &unit.pulse_train);
            unit.update_cov();
            debug!(grid, removed = report.removed, passes = report.passes, "Rate outliers removed");
        }

        if config.refine_mu && !units.is_empty() {
            let refiner = Refiner::new(config, fs);
            match refiner.prepare(&data) {
                Ok(basis) => {
                    units = refiner.refine_all(&basis, units, windows.windows());
                }
                Err(e) => {
                    warn!(grid, error = %e, "Refinement skipped");
                    self.observers.emit(ProgressEvent::Warning {
                        message: format!("Grid {} refinement skipped: {}", grid + 1, e),
                    });
                }
            }
        }

        Ok(units)
    }

    fn remove_duplicates_between_grids(&mut self) {
        let remover = DuplicateRemover::between_grids(&self.config, self.bundle.sample_rate());
        let before: usize = self.units.iter().map(Vec::len).sum();
        let survivors = remover.remove_between_grids(self.units.drain(..).flatten().collect());

        self.units = vec![Vec::new(); self.bundle.grid_count()];
        for unit in survivors {
            let grid = unit.grid;
            if let Some(slot) = self.units.get_mut(grid) {
                slot.push(unit);
            }
        }
        info!(before, after = self.units.iter().map(Vec::len).sum::<usize>(), "Duplicates between grids removed");
    }
}

/// Run one decomposition to completion on the calling thread
pub fn decompose(
    bundle: SignalBundle,
    config: DecompositionConfig,
    observers: Observers,
) -> DecompResult<DecompositionResult> {
    DecompositionSession::new(bundle, config, observers)?.run()
}

/// Run a whole session on tokio's blocking pool.
///
/// The session is handed back with its result so partial units stay
/// inspectable after a failure.
#[cfg(feature = "async")]
pub fn spawn_decomposition(
    mut session: DecompositionSession,
) -> tokio::task::JoinHandle<(DecompositionSession, DecompResult<DecompositionResult>)> {
    tokio::task::spawn_blocking(move || {
        let result = session.run();
        (session, result)
    })
}
