//! Sample Table Aggregation
//!
//! A sample table maps a file identity to every value observed for it across
//! repeated runs. Aggregation reduces each list to a mean or a confidence
//! interval, independently per key (parallelized with Rayon).

use crate::interval::{IntervalError, normal_interval};
use crate::summary::mean;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Map from file identity to the samples observed for it
pub type SampleTable = BTreeMap<String, Vec<f64>>;

/// How a sample list is reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// Sample mean
    Mean,
    /// Normal-approximation confidence interval for the mean
    #[default]
    ConfidenceInterval,
}

/// Reduced value for one key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregatedValue {
    /// Sample mean
    Mean(f64),
    /// Interval bounds
    Interval {
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },
}

impl AggregatedValue {
    /// Point estimate: the mean itself, or the interval midpoint
    pub fn point(&self) -> f64 {
        match *self {
            AggregatedValue::Mean(value) => value,
            AggregatedValue::Interval { lower, upper } => (lower + upper) / 2.0,
        }
    }
}

/// Append `value` to the samples recorded for `key`
pub fn push_sample(table: &mut SampleTable, key: &str, value: f64) {
    table.entry(key.to_string()).or_default().push(value);
}

/// Reduce every key of `table` with `mode`.
///
/// Keys with no samples are skipped. Negative results are clamped to zero.
/// An invalid confidence level is an error in interval mode, even for an
/// empty table.
pub fn aggregate(
    table: &SampleTable,
    mode: Aggregation,
    confidence_level: f64,
) -> Result<BTreeMap<String, AggregatedValue>, IntervalError> {
    if mode == Aggregation::ConfidenceInterval && !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(IntervalError::InvalidConfidenceLevel(confidence_level));
    }
    let entries: Vec<(&String, &Vec<f64>)> = table.iter().collect();

    entries
        .par_iter()
        .filter(|(_, samples)| !samples.is_empty())
        .map(|(key, samples)| -> Result<(String, AggregatedValue), IntervalError> {
            let value = match mode {
                Aggregation::Mean => AggregatedValue::Mean(mean(samples).max(0.0)),
                Aggregation::ConfidenceInterval => {
                    let ci = normal_interval(samples, confidence_level)?;
                    AggregatedValue::Interval {
                        lower: ci.lower,
                        upper: ci.upper,
                    }
                }
            };
            Ok(((*key).clone(), value))
        })
        .collect()
}
