// src/separation/mod.rs
//! Blind source separation of whitened blocks into motor-unit candidates
//!
//! Each iteration starts from an initial vector, runs the fixed-point update
//! with the configured contrast function, tightens the resulting discharge
//! pattern by minimising its inter-discharge variability and scores it with
//! the silhouette measure.

pub mod clustering;
pub mod contrast;
pub mod engine;
pub mod fixed_point;
pub mod peeloff;
pub mod quality;
pub mod regularity;
pub mod spikes;

pub use clustering::{two_means, TwoClusters};
pub use engine::{BlockContext, CandidateUnit, SeparationEngine};
pub use fixed_point::{FixedPoint, SeparationBasis};
pub use peeloff::peel_off;
pub use quality::silhouette;
pub use regularity::{minimize_cov, RegularityOutcome};
pub use spikes::{find_peaks, pulse_train, Detection, SpikeDetector};
