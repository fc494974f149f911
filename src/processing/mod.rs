// src/processing/mod.rs
//! Signal conditioning for decomposition

pub mod conditioning;
pub mod extension;
pub mod filters;
pub mod notch;
pub mod whitening;

pub use conditioning::{Conditioner, WhitenedBlock};
pub use extension::{demean, extend, extension_factor};
pub use filters::{differentiate, BandPassFilter};
pub use notch::AdaptiveNotch;
pub use whitening::{covariance, whiten, Whitening};
