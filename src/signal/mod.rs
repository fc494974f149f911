//! Input recordings: the signal bundle, electrode grids and synthetic data

pub mod bundle;
pub mod synthetic;

pub use bundle::{ElectrodeGrid, GridType, SanitizeReport, SignalBundle};
pub use synthetic::{InjectedUnit, ReferenceProfile, SyntheticConfig, SyntheticRecording};
