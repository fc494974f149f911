// src/processing/extension.rs
//! Temporal extension of a channel block

use ndarray::{Array2, Axis};

/// Number of delayed copies per channel so that the extended channel count
/// approaches `target`
pub fn extension_factor(target: usize, channels: usize) -> usize {
    if channels == 0 {
        return 1;
    }
    ((target as f64 / channels as f64).round() as usize).max(1)
}

/// Stack `factor` delayed copies of every channel.
///
/// Row `ch * factor + lag` holds channel `ch` delayed by `lag` samples, zero
/// before the block start, so the extended block keeps the input length.
pub fn extend(block: &Array2<f64>, factor: usize) -> Array2<f64> {
    let (channels, samples) = block.dim();
    let factor = factor.max(1);
    let mut extended = Array2::zeros((channels * factor, samples));

    for (ch, source) in block.outer_iter().enumerate() {
        for lag in 0..factor.min(samples) {
            let mut row = extended.row_mut(ch * factor + lag);
            for t in lag..samples {
                row[t] = source[t - lag];
            }
        }
    }
    extended
}

/// Remove each row's mean in place
pub fn demean(block: &mut Array2<f64>) {
    if block.ncols() == 0 {
        return;
    }
    for mut row in block.axis_iter_mut(Axis(0)) {
        let mean = row.sum() / row.len() as f64;
        row.mapv_inplace(|v| v - mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_factor() {
        assert_eq!(extension_factor(1000, 64), 16);
        assert_eq!(extension_factor(1000, 60), 17);
        assert_eq!(extension_factor(10, 64), 1);
        assert_eq!(extension_factor(1000, 0), 1);
    }

    #[test]
    fn test_extend_delays() {
        let block = Array2::from_shape_vec((2, 4), vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0]).unwrap();
        let extended = extend(&block, 3);
        assert_eq!(extended.dim(), (6, 4));
        assert_eq!(extended.row(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(extended.row(1).to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(extended.row(2).to_vec(), vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(extended.row(4).to_vec(), vec![0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_demean() {
        let mut block = Array2::from_shape_vec((1, 3), vec![1.0, 2.0, 6.0]).unwrap();
        demean(&mut block);
        assert_eq!(block.row(0).to_vec(), vec![-2.0, -1.0, 3.0]);
    }
}
