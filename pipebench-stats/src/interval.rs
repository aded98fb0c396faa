//! Confidence Intervals
//!
//! Normal-approximation intervals for the mean of repeated measurements:
//! `mean ± z · sem`, where `z` is the standard normal quantile for the
//! requested confidence level and `sem` the standard error of the mean.
//! Bounds are clamped at zero since every aggregated quantity (seconds,
//! verified ratios) is non-negative.

use crate::summary::compute_summary;
use thiserror::Error;

/// Confidence interval bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    /// Lower bound, never negative
    pub lower: f64,
    /// Upper bound, never negative
    pub upper: f64,
    /// Confidence level the bounds were computed for
    pub level: f64,
}

/// Errors that can occur while computing an interval
#[derive(Debug, Error, PartialEq)]
pub enum IntervalError {
    /// The sample list was empty
    #[error("No samples to compute an interval from")]
    NoSamples,

    /// The level was outside `(0, 1)`
    #[error("Invalid confidence level: {0} (must be between 0 and 1)")]
    InvalidConfidenceLevel(f64),
}

/// Normal-approximation confidence interval for the mean of `samples`.
///
/// A single sample has no spread and yields the degenerate interval `[x, x]`.
pub fn normal_interval(
    samples: &[f64],
    confidence_level: f64,
) -> Result<ConfidenceInterval, IntervalError> {
    if samples.is_empty() {
        return Err(IntervalError::NoSamples);
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(IntervalError::InvalidConfidenceLevel(confidence_level));
    }

    let summary = compute_summary(samples);
    let z = normal_quantile(0.5 + confidence_level / 2.0);
    let margin = z * summary.std_error;

    Ok(ConfidenceInterval {
        lower: clamp_non_negative(summary.mean - margin),
        upper: clamp_non_negative(summary.mean + margin),
        level: confidence_level,
    })
}

fn clamp_non_negative(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.max(0.0) }
}

/// Standard normal quantile (inverse CDF)
pub fn normal_quantile(p: f64) -> f64 {
    // Abramowitz and Stegun approximation (26.2.23)
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let p = p.clamp(1e-10, 1.0 - 1e-10);

    let sign = if p < 0.5 { -1.0 } else { 1.0 };
    let p = if p < 0.5 { p } else { 1.0 - p };

    let t = (-2.0 * p.ln()).sqrt();

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let x = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);

    sign * x
}
