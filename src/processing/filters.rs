// src/processing/filters.rs
//! Zero-phase Butterworth band-pass filtering
//!
//! The band-pass is a cascade of Butterworth high-pass and low-pass sections
//! (biquads plus one first-order section for odd orders), run forward and then
//! backward over odd-reflection padded channels.

use crate::error::{DecompErrorBuilder, DecompResult, ProcessingStage};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use std::f64::consts::PI;
use tracing::debug;

/// Transposed direct-form II second-order section, `a0` normalised to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    fn lowpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        let b0 = k2 * norm;
        Self {
            b: [b0, 2.0 * b0, b0],
            a: [2.0 * (k2 - 1.0) * norm, (1.0 - k / q + k2) * norm],
        }
    }

    fn highpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        Self {
            b: [norm, -2.0 * norm, norm],
            a: [2.0 * (k2 - 1.0) * norm, (1.0 - k / q + k2) * norm],
        }
    }

    fn first_order_lowpass(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self {
            b: [k * norm, k * norm, 0.0],
            a: [(k - 1.0) * norm, 0.0],
        }
    }

    fn first_order_highpass(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self {
            b: [norm, -norm, 0.0],
            a: [(k - 1.0) * norm, 0.0],
        }
    }

    /// DC gain of the section
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Filter in place, starting from the steady state of a constant input
    /// equal to the first sample
    fn run(&self, data: &mut [f64]) {
        let Some(&x0) = data.first() else { return };
        let y0 = self.dc_gain() * x0;
        let mut z2 = self.b[2] * x0 - self.a[1] * y0;
        let mut z1 = self.b[1] * x0 - self.a[0] * y0 + z2;

        for v in data.iter_mut() {
            let x = *v;
            let y = self.b[0] * x + z1;
            z1 = self.b[1] * x - self.a[0] * y + z2;
            z2 = self.b[2] * x - self.a[1] * y;
            *v = y;
        }
    }
}

/// Quality factors of the second-order sections of an order-`order` Butterworth
fn butterworth_qs(order: usize) -> Vec<f64> {
    (1..=order / 2)
        .map(|k| 1.0 / (2.0 * (PI * (2 * k - 1) as f64 / (2.0 * order as f64)).cos()))
        .collect()
}

/// Zero-phase Butterworth band-pass
#[derive(Debug, Clone)]
pub struct BandPassFilter {
    sections: Vec<Biquad>,
    order: usize,
}

impl BandPassFilter {
    /// Design a band-pass of `order` per edge. A high corner at or above
    /// Nyquist leaves only the high-pass half.
    pub fn butterworth(order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> DecompResult<Self> {
        let err = || DecompErrorBuilder::new("band_pass", "design");
        let nyquist = sample_rate / 2.0;
        if order == 0 {
            return Err(err().configuration("filter order must be at least 1"));
        }
        if !(low_hz > 0.0 && low_hz < nyquist && high_hz > low_hz) {
            return Err(err().numeric(
                ProcessingStage::Filtering,
                &format!("band {}-{} Hz is invalid at {} Hz sampling", low_hz, high_hz, sample_rate),
            ));
        }

        let mut sections = Vec::new();
        let k_low = (PI * low_hz / sample_rate).tan();
        for q in butterworth_qs(order) {
            sections.push(Biquad::highpass(k_low, q));
        }
        if order % 2 == 1 {
            sections.push(Biquad::first_order_highpass(k_low));
        }

        if high_hz < nyquist {
            let k_high = (PI * high_hz / sample_rate).tan();
            for q in butterworth_qs(order) {
                sections.push(Biquad::lowpass(k_high, q));
            }
            if order % 2 == 1 {
                sections.push(Biquad::first_order_lowpass(k_high));
            }
        } else {
            debug!(high_hz, nyquist, "High corner at or above Nyquist, low-pass stage skipped");
        }

        Ok(Self { sections, order })
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn run_sections(&self, data: &mut [f64]) {
        for section in &self.sections {
            section.run(data);
        }
    }

    /// Forward-backward filtering of one channel, preserving its length
    pub fn filter_zero_phase(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        if n < 2 {
            return x.to_vec();
        }
        let pad = (3 * (2 * self.order + 1)).min(n - 1);
        let mut padded = reflect_pad(x, pad);

        self.run_sections(&mut padded);
        padded.reverse();
        self.run_sections(&mut padded);
        padded.reverse();

        padded[pad..pad + n].to_vec()
    }

    /// Filter every row of a channels × samples block, channel-parallel
    pub fn apply(&self, block: &mut Array2<f64>) {
        block.axis_iter_mut(Axis(0)).into_par_iter().for_each(|mut row| {
            let filtered = self.filter_zero_phase(&row.to_vec());
            for (dst, src) in row.iter_mut().zip(filtered) {
                *dst = src;
            }
        });
    }
}

/// Odd reflection about both end samples
fn reflect_pad(x: &[f64], pad: usize) -> Vec<f64> {
    let n = x.len();
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * x[0] - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=pad).map(|i| 2.0 * x[n - 1] - x[n - 1 - i]));
    out
}

/// First-order difference with a leading zero, keeping the block length
pub fn differentiate(block: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(block.raw_dim());
    for (mut dst, src) in out.outer_iter_mut().zip(block.outer_iter()) {
        for t in 1..src.len() {
            dst[t] = src[t] - src[t - 1];
        }
    }
    out
}
