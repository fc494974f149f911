// src/segmentation.rs
//! Batch/window segmentation of a full recording
//!
//! Windows are computed once per run and shared by every grid. With a usable
//! force/target reference the windows cover the contraction plateau; otherwise
//! the recording is cut into equal contiguous pieces.

use crate::config::DecompositionConfig;
use crate::error::{DecompError, DecompResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

/// Half-open `[start, end)` sample range into the full recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: usize,
    pub end: usize,
}

impl AnalysisWindow {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Inclusive last sample index
    pub fn last(&self) -> usize {
        self.end.saturating_sub(1)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// How the windows were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentationMode {
    EqualWindows,
    Plateau,
}

/// The run's analysis windows.
///
/// `segments` are the untrimmed extents handed to conditioning; `windows` start
/// out equal to them and shrink once when the first grid trims filter edges.
#[derive(Debug, Clone)]
pub struct WindowSet {
    segments: Vec<AnalysisWindow>,
    windows: Vec<AnalysisWindow>,
    settled: Vec<bool>,
    mode: SegmentationMode,
    fallback_reason: Option<String>,
}

impl WindowSet {
    fn new(segments: Vec<AnalysisWindow>, mode: SegmentationMode, fallback_reason: Option<String>) -> Self {
        let settled = vec![false; segments.len()];
        Self {
            windows: segments.clone(),
            segments,
            settled,
            mode,
            fallback_reason,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn mode(&self) -> SegmentationMode {
        self.mode
    }

    /// Why the reference could not be used, if segmentation fell back
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn segment(&self, index: usize) -> AnalysisWindow {
        self.segments[index]
    }

    pub fn window(&self, index: usize) -> AnalysisWindow {
        self.windows[index]
    }

    pub fn windows(&self) -> &[AnalysisWindow] {
        &self.windows
    }

    pub fn is_settled(&self, index: usize) -> bool {
        self.settled[index]
    }

    /// Shrink window `index` by `edge` samples at both ends, once.
    ///
    /// Later calls return the already-settled bounds, so every grid sees the
    /// extent chosen by the first. Trimming is skipped when the result would be
    /// shorter than `min_len`.
    pub fn settle_trim(&mut self, index: usize, edge: usize, min_len: usize) -> AnalysisWindow {
        if !self.settled[index] {
            let segment = self.segments[index];
            if edge > 0 && segment.len() >= 2 * edge + min_len {
                self.windows[index] = AnalysisWindow::new(segment.start + edge, segment.end - edge);
            } else if edge > 0 {
                debug!(window = index, len = segment.len(), "Window too short for edge trimming");
            }
            self.settled[index] = true;
        }
        self.windows[index]
    }

    /// Column range of the settled window inside its segment's block
    pub fn trimmed_columns(&self, index: usize) -> Range<usize> {
        let offset = self.windows[index].start - self.segments[index].start;
        offset..offset + self.windows[index].len()
    }
}

/// Splits a recording into analysis windows
#[derive(Debug, Clone)]
pub struct Segmenter {
    window_count: usize,
    threshold_target: f64,
    min_window_samples: usize,
    noise_floor: f64,
}

impl Segmenter {
    pub fn new(window_count: usize, threshold_target: f64, min_window_samples: usize, noise_floor: f64) -> Self {
        Self {
            window_count: window_count.max(1),
            threshold_target,
            min_window_samples: min_window_samples.max(1),
            noise_floor,
        }
    }

    pub fn from_config(config: &DecompositionConfig) -> Self {
        Self::new(
            config.windows,
            config.threshold_target,
            config.conditioning.min_window_samples,
            config.conditioning.reference_noise_floor,
        )
    }

    /// Segment a recording of `samples` length
    pub fn segment(&self, reference: Option<&[f64]>, samples: usize) -> DecompResult<WindowSet> {
        let fallback_reason = match reference {
            None => None,
            Some(r) => match self.plateau_windows(r, samples) {
                Ok(windows) => {
                    debug!(windows = windows.len(), "Plateau segmentation");
                    return Ok(WindowSet::new(windows, SegmentationMode::Plateau, None));
                }
                Err(reason) => {
                    warn!(%reason, "Reference unusable, falling back to equal windows");
                    Some(reason)
                }
            },
        };

        let windows = self.equal_windows(samples)?;
        Ok(WindowSet::new(windows, SegmentationMode::EqualWindows, fallback_reason))
    }

    /// Contiguous equal windows covering the whole recording
    pub fn equal_windows(&self, samples: usize) -> DecompResult<Vec<AnalysisWindow>> {
        if samples < self.min_window_samples {
            return Err(DecompError::NoUsableWindows {
                reason: format!(
                    "recording has {} samples, minimum window is {}",
                    samples, self.min_window_samples
                ),
            });
        }
        let count = self.shrink_count(samples);
        Ok(split_even(0, samples, count))
    }

    /// Halve the requested count until windows reach the minimum length
    fn shrink_count(&self, len: usize) -> usize {
        let mut count = self.window_count;
        while count > 1 && len / count < self.min_window_samples {
            count /= 2;
        }
        count
    }

    fn plateau_windows(&self, reference: &[f64], samples: usize) -> Result<Vec<AnalysisWindow>, String> {
        if reference.len() != samples {
            return Err(format!("reference has {} samples, recording has {}", reference.len(), samples));
        }
        let min = reference.iter().copied().fold(f64::INFINITY, f64::min);
        let max = reference.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if !(range.is_finite() && range >= self.noise_floor) {
            return Err(format!("reference range {:e} is below the noise floor", range));
        }

        let threshold = min + self.threshold_target * range;
        let plateau: Vec<usize> = (0..samples).filter(|&i| reference[i] >= threshold).collect();
        if plateau.len() < self.min_window_samples {
            return Err(format!("only {} samples above the plateau threshold", plateau.len()));
        }

        let mut runs = Vec::new();
        let mut run_start = plateau[0];
        for pair in plateau.windows(2) {
            if pair[1] - pair[0] > 1 {
                runs.push((run_start, pair[0] + 1));
                run_start = pair[1];
            }
        }
        runs.push((run_start, plateau[plateau.len() - 1] + 1));

        let windows = if runs.len() == 1 {
            let (start, end) = runs[0];
            if end - start < self.min_window_samples {
                return Err(format!("plateau of {} samples is shorter than the minimum", end - start));
            }
            let count = if self.window_count > 1 { self.shrink_count(end - start) } else { 1 };
            split_even(start, end, count)
        } else {
            runs.iter()
                .flat_map(|&(start, end)| split_even(start, end, self.window_count))
                .filter(|w| w.len() >= self.min_window_samples)
                .collect()
        };

        if windows.is_empty() {
            return Err("no plateau segment reaches the minimum window length".to_string());
        }
        Ok(windows)
    }
}

/// `count` contiguous windows over `[start, end)`, the last absorbing the remainder
fn split_even(start: usize, end: usize, count: usize) -> Vec<AnalysisWindow> {
    let count = count.max(1);
    let size = (end - start) / count;
    (0..count)
        .map(|i| {
            let window_start = start + i * size;
            let window_end = if i + 1 == count { end } else { window_start + size };
            AnalysisWindow::new(window_start, window_end)
        })
        .filter(|w| !w.is_empty())
        .collect()
}
