//! Summary Statistics
//!
//! Descriptive statistics over the samples one file accumulates across
//! repeated runs. Sample counts are small (a handful of repetitions), so
//! everything is computed directly with no outlier rejection.

/// Summary of a sample list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStatistics {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub std_dev: f64,
    /// Standard error of the mean
    pub std_error: f64,
    /// Number of samples
    pub sample_count: usize,
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Compute summary statistics for a sample list
pub fn compute_summary(samples: &[f64]) -> SummaryStatistics {
    if samples.is_empty() {
        return SummaryStatistics::default();
    }

    let n = samples.len();
    let mean = mean(samples);

    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    SummaryStatistics {
        mean,
        std_dev,
        std_error: std_dev / (n as f64).sqrt(),
        sample_count: n,
    }
}
