//! Common utility functions for the decomposition engine

pub mod stats;

pub use stats::{
    coefficient_of_variation,
    discharge_rates,
    intervals,
    isi_cov,
    mean,
    mean_of_top,
    std_dev,
};
