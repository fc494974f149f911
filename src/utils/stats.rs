//! Small descriptive-statistics helpers shared by the detection and
//! post-processing passes.

/// Arithmetic mean, `0.0` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator), `0.0` below two values
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// std / mean of a sequence; NaN when fewer than two values or a zero mean
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    if m == 0.0 {
        return f64::NAN;
    }
    std_dev(values) / m
}

/// Successive differences of discharge indices, in samples
pub fn intervals(discharges: &[usize]) -> Vec<f64> {
    discharges.windows(2).map(|w| (w[1] as f64) - (w[0] as f64)).collect()
}

/// Coefficient of variation of inter-discharge intervals
pub fn isi_cov(discharges: &[usize]) -> f64 {
    coefficient_of_variation(&intervals(discharges))
}

/// Instantaneous discharge rates (Hz) between consecutive discharges
pub fn discharge_rates(discharges: &[usize], fsamp: f64) -> Vec<f64> {
    discharges
        .windows(2)
        .map(|w| fsamp / ((w[1] - w[0]) as f64))
        .collect()
}

/// Mean of the `k` largest values, `None` when empty
pub fn mean_of_top(values: &[f64], k: usize) -> Option<f64> {
    if values.is_empty() || k == 0 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let take = k.min(sorted.len());
    Some(sorted[..take].iter().sum::<f64>() / take as f64)
}
