//! EMG-Decomp: motor-unit decomposition of high-density EMG recordings
//!
//! This library turns a multi-channel HD-EMG recording into the discharge
//! patterns of individual motor units. It features:
//!
//! - Plateau-aware segmentation of the recording into analysis windows
//! - Conditioning: adaptive notch, band-pass, temporal extension and whitening
//! - Fixed-point blind source separation with selectable contrast functions
//! - Silhouette-scored spike detection with discharge-regularity optimisation
//! - Duplicate, rate-outlier and refinement passes per grid and across grids
//! - Progress and plot notifications with cooperative cancellation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use emg_decomp::{decompose, DecompositionConfig, Observers};
//! use emg_decomp::signal::{SyntheticConfig, SyntheticRecording};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recording = SyntheticRecording::generate(&SyntheticConfig::default())?;
//!     let result = decompose(recording.bundle, DecompositionConfig::default(), Observers::default())?;
//!
//!     for unit in result.all_units() {
//!         println!("grid {}: {} discharges, SIL {:.3}", unit.grid, unit.discharge_count(), unit.sil);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod error;
pub mod postprocess;
pub mod processing;
pub mod segmentation;
pub mod separation;
pub mod session;
pub mod signal;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{ConfigLoader, ContrastFunction, DecompositionConfig, Initialization};
pub use error::{DecompError, DecompResult, ProcessingStage};
pub use segmentation::{AnalysisWindow, SegmentationMode, Segmenter, WindowSet};
pub use session::{
    decompose, CancellationToken, DecompositionResult, DecompositionSession, MotorUnit, Observers, PlotFrame,
    PlotSink, ProgressEvent, ProgressSink, SessionState,
};
pub use signal::{ElectrodeGrid, GridType, SignalBundle};

#[cfg(feature = "async")]
pub use session::spawn_decomposition;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Motor-unit decomposition of high-density EMG recordings".to_string(),
        features: vec![
            "Analysis-window segmentation".to_string(),
            "Notch, band-pass, extension and whitening".to_string(),
            "Fixed-point blind source separation".to_string(),
            "Duplicate, outlier and refinement passes".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }
}
