// src/config/constants.rs
//! Named constants for the decomposition engine

/// Batch/window segmentation constants
pub mod segmentation {
    pub const DEFAULT_WINDOW_COUNT: usize = 1;
    pub const DEFAULT_THRESHOLD_TARGET: f64 = 0.8;
    pub const MIN_WINDOW_SAMPLES: usize = 2048;
    /// Reference signals whose range is below this are treated as flat
    pub const REFERENCE_NOISE_FLOOR: f64 = 1e-9;
}

/// Filter bank, extension and whitening constants
pub mod conditioning {
    pub const SURFACE_BAND_HZ: (f64, f64) = (20.0, 500.0);
    pub const INTRA_BAND_HZ: (f64, f64) = (100.0, 4400.0);
    pub const DEFAULT_FILTER_ORDER: usize = 2;
    pub const MAX_FILTER_ORDER: usize = 8;

    /// Spectral bins further than this many robust deviations above the local
    /// median are treated as line interference
    pub const NOTCH_OUTLIER_FACTOR: f64 = 5.0;
    /// Half-width of the local-median neighbourhood, in Hz
    pub const NOTCH_NEIGHBOURHOOD_HZ: f64 = 10.0;
    /// Length of each adaptive notch sub-window, in seconds
    pub const NOTCH_SUBWINDOW_SECONDS: f64 = 1.0;

    pub const DEFAULT_EXTENDED_CHANNELS: usize = 1000;
    pub const DEFAULT_EDGES_SECONDS: f64 = 0.5;

    /// Relative eigenvalue floor below which components are numerically zero
    pub const EIGEN_RELATIVE_EPSILON: f64 = 1e-12;
}

/// Separation engine constants
pub mod separation {
    pub const DEFAULT_ITERATIONS: usize = 75;
    pub const MAX_FIXED_POINT_ITERATIONS: usize = 500;
    pub const FIXED_POINT_TOLERANCE: f64 = 1e-4;
    pub const PEAK_DISTANCE_SECONDS: f64 = 0.02;
    pub const AGGREGATION_PEAK_DISTANCE_SECONDS: f64 = 0.005;
    pub const TOP_PEAKS_FOR_NORMALISATION: usize = 10;
    pub const DISCHARGE_OUTLIER_SIGMA: f64 = 4.0;
    pub const MIN_DISCHARGES_FOR_REGULARITY: usize = 10;
    pub const MAX_REGULARITY_STEPS: usize = 100;
    pub const PEELOFF_HALF_WINDOW_SECONDS: f64 = 0.025;
    pub const DEFAULT_SIL_THRESHOLD: f64 = 0.9;
    pub const DEFAULT_COV_THRESHOLD: f64 = 0.5;
    pub const KMEANS_RESTARTS: usize = 3;
    pub const KMEANS_MAX_ITERATIONS: usize = 100;
    pub const DEFAULT_SEED: u64 = 42;
}

/// Duplicate removal constants
pub mod duplicates {
    pub const DEFAULT_THRESHOLD: f64 = 0.3;
    pub const JITTER_SECONDS: f64 = 0.00025;
    /// Maximum cross-correlation lag is `fsamp / MAX_LAG_DIVISOR`
    pub const MAX_LAG_DIVISOR: f64 = 40.0;
    /// Normalised cross-correlation required before re-aligning two trains
    pub const CORRELATION_GATE: f64 = 0.2;
}

/// Discharge-rate outlier removal constants
pub mod outliers {
    pub const COV_THRESHOLD: f64 = 0.4;
    pub const MAX_ITERATIONS: usize = 30;
    pub const RATE_SIGMA: f64 = 3.0;
}
