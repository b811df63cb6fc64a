/// Shared numeric helpers used across the histogram, simulation, and XmR
/// modules. Kept tiny and dependency-free on purpose — these are called in
/// hot loops during Monte-Carlo trials.

/// Percentile `p` (0.0-1.0) of `values`, using `index = floor(n * p)` on a
/// sorted copy, per the `CycleTimeAnalysis` scenario (§8).
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let index = ((sorted.len() as f64) * p).floor() as usize;
    let index = index.min(sorted.len() - 1);
    sorted[index]
}

/// Percentile over a pre-sorted slice of already-sorted `u32` counts,
/// promoted to `f64`.
pub fn percentile_u32(values: &[u32], p: f64) -> f64 {
    let as_f64: Vec<f64> = values.iter().map(|v| *v as f64).collect();
    percentile(&as_f64, p)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub fn mean_u32(values: &[u32]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
    }
}

/// Pearson correlation coefficient. Returns 0.0 for degenerate (zero
/// variance, or length-mismatched) inputs rather than NaN.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let mean_a = mean(a);
    let mean_b = mean(b);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..a.len() {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_matches_cycle_time_scenario() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        assert_eq!(percentile(&values, 0.1), 2.0);
        assert_eq!(percentile(&values, 0.5), 6.0);
        assert_eq!(percentile(&values, 0.9), 10.0);
    }

    #[test]
    fn perfect_negative_correlation_is_minus_one() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![4.0, 3.0, 2.0, 1.0];
        assert!((pearson_correlation(&a, &b) + 1.0).abs() < 1e-9);
    }
}
