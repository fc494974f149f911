// src/separation/fixed_point.rs
//! Deflationary fixed-point iteration in the whitened space

use crate::config::ContrastFunction;
use ndarray::{Array1, Array2};

/// Orthonormal basis of the separation vectors found so far
#[derive(Debug, Clone, Default)]
pub struct SeparationBasis {
    vectors: Vec<Array1<f64>>,
}

impl SeparationBasis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// `w ← w − B·Bᵀ·w`
    pub fn project_out(&self, w: &mut Array1<f64>) {
        for b in &self.vectors {
            let projection = b.dot(w);
            w.scaled_add(-projection, b);
        }
    }

    /// Add the component of `w` orthogonal to the basis. Vectors already in
    /// the span are ignored.
    pub fn push(&mut self, w: &Array1<f64>) {
        let mut v = w.clone();
        self.project_out(&mut v);
        if normalize(&mut v) {
            self.vectors.push(v);
        }
    }
}

/// Scale to unit length; `false` when the vector is zero or not finite
pub fn normalize(w: &mut Array1<f64>) -> bool {
    let norm = w.dot(w).sqrt();
    if !(norm.is_finite() && norm > f64::EPSILON) {
        return false;
    }
    w.mapv_inplace(|v| v / norm);
    true
}

/// Fixed-point settings
#[derive(Debug, Clone, Copy)]
pub struct FixedPoint {
    pub contrast: ContrastFunction,
    pub max_iterations: usize,
    pub tolerance: f64,
}

/// Outcome of one fixed-point search
#[derive(Debug, Clone)]
pub struct FixedPointOutcome {
    pub w: Array1<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl FixedPoint {
    /// Iterate `w ← mean(Z·g(wᵀZ)) − mean(g'(wᵀZ))·w`, deflating against
    /// `basis` and normalising each step. `None` if `w` collapses to zero.
    pub fn run(&self, mut w: Array1<f64>, whitened: &Array2<f64>, basis: &SeparationBasis) -> Option<FixedPointOutcome> {
        let n = whitened.ncols().max(1) as f64;
        basis.project_out(&mut w);
        if !normalize(&mut w) {
            return None;
        }

        for iteration in 1..=self.max_iterations {
            let projection = w.dot(whitened);
            let g = projection.mapv(|x| self.contrast.g(x));
            let mean_dg = projection.iter().map(|&x| self.contrast.dg(x)).sum::<f64>() / n;

            let mut next = whitened.dot(&g) / n;
            next.scaled_add(-mean_dg, &w);
            basis.project_out(&mut next);
            if !normalize(&mut next) {
                return None;
            }

            let change = (next.dot(&w) - 1.0).abs();
            w = next;
            if change < self.tolerance {
                return Some(FixedPointOutcome {
                    w,
                    iterations: iteration,
                    converged: true,
                });
            }
        }

        Some(FixedPointOutcome {
            w,
            iterations: self.max_iterations,
            converged: false,
        })
    }
}
