// src/processing/whitening.rs
//! Covariance, reduced-rank whitening and pseudo-inverse of an extended block

use crate::config::constants::conditioning::EIGEN_RELATIVE_EPSILON;
use crate::error::{DecompError, DecompResult, ProcessingStage};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;
use tracing::debug;

/// Whitening transform of one extended block.
///
/// Only eigen-components above the noise floor are kept, so `dewhitening ·
/// whitening` is the projector onto the retained subspace rather than identity.
#[derive(Debug, Clone)]
pub struct Whitening {
    pub whitening: Array2<f64>,
    pub dewhitening: Array2<f64>,
    pub rank: usize,
}

impl Whitening {
    /// Reduced-rank pseudo-inverse of the covariance, `W · W`
    pub fn inverse_covariance(&self) -> Array2<f64> {
        self.whitening.dot(&self.whitening)
    }
}

/// `X Xᵀ / n` of a channels × samples block
pub fn covariance(block: &Array2<f64>) -> Array2<f64> {
    let n = block.ncols().max(1) as f64;
    block.dot(&block.t()) / n
}

/// Eigen-decompose the covariance of a demeaned block and build the ZCA
/// whitening restricted to components above the noise floor (the mean of the
/// lower half of the spectrum).
pub fn whiten(block: &Array2<f64>) -> DecompResult<Whitening> {
    let dim = block.nrows();
    if dim == 0 || block.ncols() < 2 {
        return Err(DecompError::numeric(ProcessingStage::Whitening, "whitening", "empty block"));
    }

    let cov = covariance(block);
    let matrix = DMatrix::from_fn(dim, dim, |i, j| cov[[i, j]]);
    let eigen = SymmetricEigen::new(matrix);

    let mut values: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
    let largest = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(largest.is_finite() && largest > 0.0) {
        return Err(DecompError::numeric(
            ProcessingStage::Whitening,
            "whitening",
            "zero-variance or non-finite covariance",
        ));
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let lower = &values[..(dim / 2).max(1)];
    let noise_floor = lower.iter().sum::<f64>() / lower.len() as f64;
    let numeric_floor = largest * EIGEN_RELATIVE_EPSILON;

    let mut retained: Vec<usize> = (0..dim)
        .filter(|&i| {
            let v = eigen.eigenvalues[i];
            v > noise_floor && v > numeric_floor
        })
        .collect();
    if retained.is_empty() {
        retained = (0..dim).filter(|&i| eigen.eigenvalues[i] > numeric_floor).collect();
    }
    debug!(dim, rank = retained.len(), noise_floor, "Whitening rank");

    let rank = retained.len();
    let basis = Array2::from_shape_fn((dim, rank), |(i, c)| eigen.eigenvectors[(i, retained[c])]);
    let scaled = |power: f64| {
        let mut columns = basis.clone();
        for (c, mut column) in columns.columns_mut().into_iter().enumerate() {
            let factor = eigen.eigenvalues[retained[c]].powf(power);
            column.mapv_inplace(|v| v * factor);
        }
        columns.dot(&basis.t())
    };
    let whitening = scaled(-0.5);
    let dewhitening = scaled(0.5);

    Ok(Whitening {
        whitening,
        dewhitening,
        rank: retained.len(),
    })
}
