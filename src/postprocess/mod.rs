// src/postprocess/mod.rs
//! Per-grid post-processing: filter aggregation over the whole recording,
//! duplicate removal, rate-outlier pruning and filter refinement

pub mod aggregator;
pub mod duplicates;
pub mod outliers;
pub mod refine;

pub use aggregator::Aggregator;
pub use duplicates::DuplicateRemover;
pub use outliers::{OutlierRemover, OutlierReport};
pub use refine::{RefineBasis, RefineOutcome, Refiner};
