//! Statistical summaries for repeated measurements.
//!
//! Computes mean, standard deviation and 95% confidence intervals from raw
//! samples (confirmation latencies, gas used per run, cost per run).

use serde::{Deserialize, Serialize};

/// Statistical summary of a sample set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub stddev: f64,
    /// Lower bound of the 95% confidence interval.
    pub ci_lower: f64,
    /// Upper bound of the 95% confidence interval.
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

/// Z-score for 95% confidence interval (two-tailed).
const Z_95: f64 = 1.96;

/// Compute statistics from a slice of samples.
///
/// Returns `None` if fewer than 2 samples (cannot compute stddev).
pub fn compute_stats(values: &[f64]) -> Option<SampleStats> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;

    let mean = values.iter().sum::<f64>() / n_f;

    // Bessel's correction
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n_f - 1.0);
    let stddev = variance.sqrt();

    let ci_margin = Z_95 * stddev / n_f.sqrt();

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(SampleStats {
        mean,
        stddev,
        ci_lower: mean - ci_margin,
        ci_upper: mean + ci_margin,
        min,
        max,
        samples: n,
    })
}

/// Mean of the samples, 0 when there are none.
pub fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_stats_constant() {
        let stats = compute_stats(&[100.0, 100.0, 100.0, 100.0]).expect("should compute stats");

        assert_eq!(stats.samples, 4);
        assert!((stats.mean - 100.0).abs() < 1e-9);
        assert!(stats.stddev < 1e-9, "stddev should be ~0, got {}", stats.stddev);
        assert!(
            (stats.ci_lower - stats.ci_upper).abs() < 1e-9,
            "CI should be zero-width for constant data"
        );
    }

    #[test]
    fn test_compute_stats_variance() {
        let stats = compute_stats(&[10.0, 20.0, 30.0, 40.0, 50.0]).expect("should compute stats");

        assert!((stats.mean - 30.0).abs() < 1e-9);
        // sqrt((400+100+0+100+400) / 4)
        assert!(
            (stats.stddev - 15.811_388_3).abs() < 1e-6,
            "stddev should be ~15.8, got {}",
            stats.stddev
        );
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 50.0);
        assert!(stats.ci_lower < stats.mean);
        assert!(stats.ci_upper > stats.mean);
    }

    #[test]
    fn test_compute_stats_too_few_samples() {
        assert!(compute_stats(&[1.0]).is_none());
        assert!(compute_stats(&[]).is_none());
    }

    #[test]
    fn test_mean_or_zero() {
        assert_eq!(mean_or_zero(&[]), 0.0);
        assert_eq!(mean_or_zero(&[2.0, 4.0]), 3.0);
    }
}
