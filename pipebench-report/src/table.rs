//! Aggregated Tables
//!
//! [`Data`] collects samples from any number of run logs of one experiment
//! configuration and reduces them into an [`ExperimentTable`]: stage times as
//! confidence intervals and the verified ratio as a mean.
//! [`ComparisonTable`] lines several configurations up file by file.

use crate::report::{RunLog, StageTimes, Verdict};
use pipebench_stats::{
    AggregatedValue, Aggregation, IntervalError, SampleTable, aggregate, push_sample,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Interval bounds in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub lower: f64,
    pub upper: f64,
}

/// One file's aggregated row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRow {
    pub file: String,
    /// Number of runs that reported a verdict for this file
    pub runs: usize,
    pub fuzz_time: Option<TimeInterval>,
    pub decompose_time: Option<TimeInterval>,
    pub verification_time: Option<TimeInterval>,
    /// Fraction of runs that verified the file
    pub verified_ratio: Option<f64>,
}

/// Aggregated view of one experiment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentTable {
    pub label: String,
    pub confidence_level: f64,
    /// Number of run logs aggregated
    pub run_logs: usize,
    pub rows: Vec<FileRow>,
}

/// Samples accumulated across run logs, keyed by file
#[derive(Debug, Clone, Default)]
pub struct Data {
    fuzz_time: SampleTable,
    decompose_time: SampleTable,
    verification_time: SampleTable,
    verification_results: SampleTable,
    run_logs: usize,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one stage-time tuple for `file`
    pub fn insert_time_measurement(&mut self, file: &str, times: &StageTimes) {
        push_sample(&mut self.fuzz_time, file, times.fuzz());
        push_sample(&mut self.decompose_time, file, times.decompose());
        push_sample(&mut self.verification_time, file, times.verify());
    }

    /// Append 1 for a verified file, 0 otherwise
    pub fn insert_verification_result(&mut self, file: &str, verdict: Verdict) {
        push_sample(&mut self.verification_results, file, verdict.as_sample());
    }

    /// Append every measurement of a run log
    pub fn insert_run_log(&mut self, log: &RunLog) {
        for (file, times) in &log.time_measurements {
            self.insert_time_measurement(file, times);
        }
        for (file, verdict) in &log.verification_results {
            self.insert_verification_result(file, *verdict);
        }
        self.run_logs += 1;
    }

    /// Number of run logs inserted
    pub fn run_logs(&self) -> usize {
        self.run_logs
    }

    /// Raw samples: fuzz, decompose, verification time, verification results
    pub fn raw(&self) -> [(&'static str, &SampleTable); 4] {
        [
            ("fuzz_time", &self.fuzz_time),
            ("decompose_time", &self.decompose_time),
            ("verification_time", &self.verification_time),
            ("verification_results", &self.verification_results),
        ]
    }

    /// Reduce the samples into a table. Fails on a confidence level outside `(0, 1)`.
    pub fn transform(&self, label: &str, confidence_level: f64) -> Result<ExperimentTable, IntervalError> {
        let interval = |table: &SampleTable| {
            aggregate(table, Aggregation::ConfidenceInterval, confidence_level)
        };
        let fuzz = interval(&self.fuzz_time)?;
        let decompose = interval(&self.decompose_time)?;
        let verify = interval(&self.verification_time)?;
        let verified = aggregate(&self.verification_results, Aggregation::Mean, confidence_level)?;

        let files: BTreeSet<&String> = self
            .fuzz_time
            .keys()
            .chain(self.verification_results.keys())
            .collect();

        let rows = files
            .into_iter()
            .map(|file| FileRow {
                file: file.clone(),
                runs: self.verification_results.get(file).map_or(0, Vec::len),
                fuzz_time: fuzz.get(file).and_then(as_interval),
                decompose_time: decompose.get(file).and_then(as_interval),
                verification_time: verify.get(file).and_then(as_interval),
                verified_ratio: verified.get(file).map(AggregatedValue::point),
            })
            .collect();

        Ok(ExperimentTable {
            label: label.to_string(),
            confidence_level,
            run_logs: self.run_logs,
            rows,
        })
    }
}

fn as_interval(value: &AggregatedValue) -> Option<TimeInterval> {
    match *value {
        AggregatedValue::Interval { lower, upper } => Some(TimeInterval { lower, upper }),
        AggregatedValue::Mean(_) => None,
    }
}

/// One configuration's numbers for a file in a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonCell {
    pub verified_ratio: Option<f64>,
    pub verification_time: Option<TimeInterval>,
}

/// One file across all compared configurations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub file: String,
    /// Parallel to [`ComparisonTable::configurations`]; `None` when the
    /// configuration never ran the file
    pub cells: Vec<Option<ComparisonCell>>,
}

/// Several experiment configurations side by side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub configurations: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    /// Line up `tables` file by file, in the given configuration order
    pub fn from_tables(tables: &[ExperimentTable]) -> Self {
        let lookups: Vec<BTreeMap<&str, &FileRow>> = tables
            .iter()
            .map(|table| table.rows.iter().map(|row| (row.file.as_str(), row)).collect())
            .collect();

        let files: BTreeSet<&str> = lookups.iter().flat_map(|rows| rows.keys().copied()).collect();

        let rows = files
            .into_iter()
            .map(|file| ComparisonRow {
                file: file.to_string(),
                cells: lookups
                    .iter()
                    .map(|rows| {
                        rows.get(file).map(|row| ComparisonCell {
                            verified_ratio: row.verified_ratio,
                            verification_time: row.verification_time,
                        })
                    })
                    .collect(),
            })
            .collect();

        Self {
            configurations: tables.iter().map(|t| t.label.clone()).collect(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(verdict: Verdict, verify: f64) -> RunLog {
        let mut log = RunLog::default();
        log.time_measurements
            .insert("stac/A.java".to_string(), StageTimes::new(30.0, 5.0, verify));
        log.verification_results
            .insert("stac/A.java".to_string(), verdict);
        log
    }

    #[test]
    fn test_transform_aggregates_runs() {
        let mut data = Data::new();
        data.insert_run_log(&log(Verdict::Verified, 10.0));
        data.insert_run_log(&log(Verdict::Unknown, 12.0));
        data.insert_run_log(&log(Verdict::Verified, 11.0));

        let table = data.transform("selective", 0.95).unwrap();
        assert_eq!(table.run_logs, 3);
        assert_eq!(table.rows.len(), 1);

        let row = &table.rows[0];
        assert_eq!(row.runs, 3);
        assert!((row.verified_ratio.unwrap() - 2.0 / 3.0).abs() < 1e-9);

        let verify = row.verification_time.unwrap();
        assert!(verify.lower < 11.0 && verify.upper > 11.0);

        // identical fuzz samples collapse to a point
        let fuzz = row.fuzz_time.unwrap();
        assert_eq!(fuzz.lower, 30.0);
        assert_eq!(fuzz.upper, 30.0);
    }

    #[test]
    fn test_transform_rejects_percent_level() {
        let mut data = Data::new();
        for _ in 0..3 {
            data.insert_run_log(&log(Verdict::Verified, 10.0));
        }
        assert_eq!(
            data.transform("selective", 95.0),
            Err(IntervalError::InvalidConfidenceLevel(95.0))
        );
    }

    #[test]
    fn test_comparison_marks_missing_files() {
        let mut selective = Data::new();
        selective.insert_run_log(&log(Verdict::Verified, 10.0));

        let mut worst = Data::new();
        let mut other = RunLog::default();
        other
            .time_measurements
            .insert("lang3/B.java".to_string(), StageTimes::verification_only(2.0));
        other
            .verification_results
            .insert("lang3/B.java".to_string(), Verdict::NotVerified);
        worst.insert_run_log(&other);

        let comparison = ComparisonTable::from_tables(&[
            selective.transform("selective", 0.95).unwrap(),
            worst.transform("worst", 0.95).unwrap(),
        ]);

        assert_eq!(comparison.configurations, vec!["selective", "worst"]);
        assert_eq!(comparison.rows.len(), 2);
        assert_eq!(comparison.rows[0].file, "lang3/B.java");
        assert!(comparison.rows[0].cells[0].is_none());
        assert_eq!(
            comparison.rows[0].cells[1].as_ref().unwrap().verified_ratio,
            Some(0.0)
        );
        assert!(comparison.rows[1].cells[1].is_none());
    }
}
