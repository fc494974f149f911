// src/separation/quality.rs
//! Silhouette-like separation quality (SIL)

use super::spikes::Detection;

/// `(inter − intra) / max(inter, intra)` over the discharge cluster, where
/// `intra` sums squared distances to its own centroid and `inter` to the noise
/// centroid. Zero with fewer than two peaks or no clustering.
pub fn silhouette(detection: &Detection) -> f64 {
    let Some(clusters) = &detection.clusters else {
        return 0.0;
    };
    if detection.peaks.len() < 2 {
        return 0.0;
    }

    let (mut intra, mut inter) = (0.0, 0.0);
    for (&peak, &is_high) in detection.peaks.iter().zip(&clusters.high) {
        if !is_high {
            continue;
        }
        let v = detection.pulse_train[peak];
        intra += (v - clusters.high_centroid).powi(2);
        inter += (v - clusters.low_centroid).powi(2);
    }

    let denom = intra.max(inter);
    if denom > 0.0 {
        (inter - intra) / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::separation::spikes::SpikeDetector;

    #[test]
    fn test_clean_train_scores_high() {
        let mut pulse = vec![0.0; 2000];
        for (i, v) in pulse.iter_mut().enumerate() {
            *v = 0.02 * ((i * 31) % 7) as f64;
        }
        for t in (50..2000).step_by(100) {
            pulse[t] = 5.0 + 0.1 * ((t / 100) % 3) as f64;
        }
        let detection = SpikeDetector::new(20, 4.0, 42).detect(pulse);
        let sil = silhouette(&detection);
        assert!(sil > 0.95, "sil = {}", sil);
    }

    #[test]
    fn test_no_peaks_scores_zero() {
        let detection = SpikeDetector::new(20, 4.0, 42).detect(vec![1.0; 100]);
        assert_eq!(silhouette(&detection), 0.0);
    }
}
