#![warn(missing_docs)]
//! Pipebench Statistical Engine
//!
//! Elementary descriptive statistics for measurements gathered across
//! repeated runs of an external pipeline:
//! - Summary statistics (mean, standard deviation, standard error)
//! - Normal-approximation confidence intervals for the mean
//! - Per-key aggregation of sample tables (mean or confidence interval)
//! - Collision probability and subset-selection complexity for fuzzer inputs

mod aggregate;
mod interval;
mod probability;
mod summary;

pub use aggregate::{AggregatedValue, Aggregation, SampleTable, aggregate, push_sample};
pub use interval::{ConfidenceInterval, IntervalError, normal_interval, normal_quantile};
pub use probability::{
    CollisionRow, collision_probability, collision_table, subset_selection_complexity,
};
pub use summary::{SummaryStatistics, compute_summary, mean};

/// Default confidence level (95%)
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
