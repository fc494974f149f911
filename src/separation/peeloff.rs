// src/separation/peeloff.rs
//! Subtract an accepted unit's spike-triggered waveform from the residual

use ndarray::Array2;

/// Remove the contribution of a unit firing at `discharges` from every row of
/// `residual`.
///
/// The waveform of each row is the average of `±half_window` samples around
/// the discharges; it is convolved with the firing train and subtracted.
/// Discharges too close to either edge do not contribute to the average.
pub fn peel_off(residual: &mut Array2<f64>, discharges: &[usize], half_window: usize) {
    let samples = residual.ncols();
    let span = 2 * half_window + 1;
    let usable: Vec<usize> = discharges
        .iter()
        .copied()
        .filter(|&d| d >= half_window && d + half_window < samples)
        .collect();
    if usable.is_empty() {
        return;
    }
    let count = usable.len() as f64;

    for mut row in residual.outer_iter_mut() {
        let mut waveform = vec![0.0; span];
        for &d in &usable {
            for (k, w) in waveform.iter_mut().enumerate() {
                *w += row[d - half_window + k];
            }
        }
        waveform.iter_mut().for_each(|w| *w /= count);

        for &d in discharges {
            for (k, &w) in waveform.iter().enumerate() {
                let Some(t) = (d + k).checked_sub(half_window) else { continue };
                if t < samples {
                    row[t] -= w;
                }
            }
        }
    }
}
