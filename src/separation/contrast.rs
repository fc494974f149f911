// src/separation/contrast.rs
//! Contrast functions and their analytic derivatives

use crate::config::ContrastFunction;
use std::f64::consts::LN_2;

impl ContrastFunction {
    /// `g(x)`
    #[inline]
    pub fn g(self, x: f64) -> f64 {
        match self {
            ContrastFunction::Square => x * x,
            ContrastFunction::Skew => x * x * x / 3.0,
            ContrastFunction::Exp => (-0.5 * x * x).exp(),
            ContrastFunction::Logcosh => {
                // log(cosh x) without overflow for large |x|
                let a = x.abs();
                a + (-2.0 * a).exp().ln_1p() - LN_2
            }
        }
    }

    /// `g'(x)`
    #[inline]
    pub fn dg(self, x: f64) -> f64 {
        match self {
            ContrastFunction::Square => 2.0 * x,
            ContrastFunction::Skew => x * x,
            ContrastFunction::Exp => -x * (-0.5 * x * x).exp(),
            ContrastFunction::Logcosh => x.tanh(),
        }
    }
}
