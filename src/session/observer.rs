// src/session/observer.rs
//! Progress and plot notifications, plus cooperative cancellation
//!
//! The session calls its sinks synchronously on the thread running the
//! decomposition. Sinks must return quickly; [`ChannelSink`] hands events to
//! another thread without ever blocking.

use crate::segmentation::{AnalysisWindow, SegmentationMode};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Notification emitted by a running session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    SessionStarted { grids: usize, samples: usize },
    Warning { message: String },
    WindowsReady { windows: Vec<AnalysisWindow>, mode: SegmentationMode },
    GridStarted { grid: usize, grids: usize },
    WindowConditioned { grid: usize, window: usize, windows: usize, rank: usize },
    Iteration {
        grid: usize,
        window: usize,
        iteration: usize,
        iterations: usize,
        sil: f64,
        cov: f64,
        accepted: bool,
    },
    GridCompleted { grid: usize, units: usize },
    GridFailed { grid: usize, reason: String },
    CrossGridCompleted { units: usize },
    SessionCompleted { units: usize },
    SessionFailed { reason: String },
}

impl ProgressEvent {
    /// Human-readable message
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::SessionStarted { grids, samples } => {
                format!("Starting decomposition of {} grid(s), {} samples", grids, samples)
            }
            ProgressEvent::Warning { message } => format!("Warning: {}", message),
            ProgressEvent::WindowsReady { windows, mode } => {
                format!("{} analysis window(s) ({:?})", windows.len(), mode)
            }
            ProgressEvent::GridStarted { grid, grids } => format!("Grid {}/{}", grid + 1, grids),
            ProgressEvent::WindowConditioned { grid, window, windows, rank } => format!(
                "Grid {} window {}/{} conditioned, whitened rank {}",
                grid + 1,
                window + 1,
                windows,
                rank
            ),
            ProgressEvent::Iteration { grid, window, iteration, iterations, sil, cov, accepted } => format!(
                "Grid {} window {} iteration {}/{}: SIL {:.4}, CoV {:.4}{}",
                grid + 1,
                window + 1,
                iteration + 1,
                iterations,
                sil,
                cov,
                if *accepted { " (accepted)" } else { "" }
            ),
            ProgressEvent::GridCompleted { grid, units } => {
                format!("Grid {} done: {} motor unit(s)", grid + 1, units)
            }
            ProgressEvent::GridFailed { grid, reason } => format!("Grid {} failed: {}", grid + 1, reason),
            ProgressEvent::CrossGridCompleted { units } => {
                format!("Duplicates between grids removed: {} motor unit(s) remain", units)
            }
            ProgressEvent::SessionCompleted { units } => format!("Decomposition done: {} motor unit(s)", units),
            ProgressEvent::SessionFailed { reason } => format!("Decomposition failed: {}", reason),
        }
    }

    /// Fractional progress through the current stage, when one applies
    pub fn progress(&self) -> Option<f64> {
        match self {
            ProgressEvent::GridStarted { grid, grids } => Some(*grid as f64 / (*grids).max(1) as f64),
            ProgressEvent::WindowConditioned { window, windows, .. } => {
                Some((*window + 1) as f64 / (*windows).max(1) as f64)
            }
            ProgressEvent::Iteration { iteration, iterations, .. } => {
                Some((*iteration + 1) as f64 / (*iterations).max(1) as f64)
            }
            ProgressEvent::SessionCompleted { .. } => Some(1.0),
            _ => None,
        }
    }
}

/// Diagnostic data of one separation iteration
#[derive(Debug, Clone, Serialize)]
pub struct PlotFrame {
    pub grid: usize,
    pub window: usize,
    pub iteration: usize,
    /// Seconds, one entry per sample of the window
    pub time_axis: Vec<f64>,
    pub reference: Option<Vec<f64>>,
    pub window_bounds: AnalysisWindow,
    pub pulse_train: Vec<f64>,
    /// Indices into the full recording
    pub discharges: Vec<usize>,
    pub sil: f64,
    pub cov: f64,
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

pub trait PlotSink: Send + Sync {
    fn on_frame(&self, frame: PlotFrame);

    /// Frames are only built when this returns `true`
    fn wants_frames(&self) -> bool {
        true
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

impl PlotSink for NullSink {
    fn on_frame(&self, _frame: PlotFrame) {}

    fn wants_frames(&self) -> bool {
        false
    }
}

/// Forwards progress to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Warning { .. } | ProgressEvent::GridFailed { .. } | ProgressEvent::SessionFailed { .. } => {
                warn!(progress = ?event.progress(), "{}", event.message())
            }
            ProgressEvent::Iteration { .. } | ProgressEvent::WindowConditioned { .. } => {
                debug!(progress = ?event.progress(), "{}", event.message())
            }
            _ => info!(progress = ?event.progress(), "{}", event.message()),
        }
    }
}

/// Sends progress and plot data over crossbeam channels.
///
/// Progress uses an unbounded channel; plot frames go through a bounded one
/// and are dropped when the receiver falls behind.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    progress: Sender<ProgressEvent>,
    frames: Sender<PlotFrame>,
}

impl ChannelSink {
    pub fn new(frame_capacity: usize) -> (Self, Receiver<ProgressEvent>, Receiver<PlotFrame>) {
        let (progress_tx, progress_rx) = channel::unbounded();
        let (frame_tx, frame_rx) = channel::bounded(frame_capacity.max(1));
        (
            Self {
                progress: progress_tx,
                frames: frame_tx,
            },
            progress_rx,
            frame_rx,
        )
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, event: &ProgressEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.progress.send(event.clone());
    }
}

impl PlotSink for ChannelSink {
    fn on_frame(&self, frame: PlotFrame) {
        match self.frames.try_send(frame) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => debug!("Plot receiver behind, frame dropped"),
        }
    }
}

/// Keeps every event and frame in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
    frames: Mutex<Vec<PlotFrame>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(ProgressEvent::message).collect()
    }

    pub fn frames(&self) -> Vec<PlotFrame> {
        self.frames.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl ProgressSink for CollectingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}

impl PlotSink for CollectingSink {
    fn on_frame(&self, frame: PlotFrame) {
        self.frames.lock().push(frame);
    }
}

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Sinks and cancellation handed to a session
#[derive(Clone)]
pub struct Observers {
    pub progress: Arc<dyn ProgressSink>,
    pub plot: Arc<dyn PlotSink>,
    pub cancel: CancellationToken,
}

impl Default for Observers {
    fn default() -> Self {
        Self {
            progress: Arc::new(NullSink),
            plot: Arc::new(NullSink),
            cancel: CancellationToken::new(),
        }
    }
}

impl Observers {
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_plot(mut self, sink: Arc<dyn PlotSink>) -> Self {
        self.plot = sink;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
