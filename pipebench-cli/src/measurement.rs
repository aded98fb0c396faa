//! Per-run measurement accumulator

use crate::files::inner_most_package_name;
use crate::interpreter::{classify, extract_metrics};
use crate::runner::RunOutput;
use pipebench_report::{
    LogError, RunLog, RunMeta, SecondaryMetrics, StageTimes, Verdict, generate_json, write_run_log,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Times, verdicts and per-package counts of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct TimeMeasurement {
    time_measurements: BTreeMap<String, StageTimes>,
    verification_results: BTreeMap<String, Verdict>,
    count_verified: BTreeMap<String, u64>,
    count_not_verified: BTreeMap<String, u64>,
    count_unknown: BTreeMap<String, u64>,
    metrics: BTreeMap<String, SecondaryMetrics>,
    total_time: f64,
}

impl TimeMeasurement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one file: classify the verifier output, bump the package
    /// counter for the verdict, and store the stage times.
    ///
    /// A verifier killed at its deadline is `Unknown` whatever it printed.
    pub fn update(&mut self, java_file: &Path, verifier: &RunOutput, times: StageTimes) -> Verdict {
        let verdict = if verifier.timed_out {
            Verdict::Unknown
        } else {
            classify(&verifier.output)
        };
        let package = inner_most_package_name(java_file);
        let counter = match verdict {
            Verdict::Verified => &mut self.count_verified,
            Verdict::NotVerified => &mut self.count_not_verified,
            Verdict::Unknown => &mut self.count_unknown,
        };
        *counter.entry(package).or_insert(0) += 1;

        let key = java_file.display().to_string();
        self.verification_results.insert(key.clone(), verdict);
        self.time_measurements.insert(key, times);
        self.total_time += times.total();
        verdict
    }

    /// Keep whatever counts the decomposition stage reported for `java_file`
    pub fn record_metrics(&mut self, java_file: &Path, decomposition_output: &str) {
        let metrics = extract_metrics(decomposition_output);
        if !metrics.is_empty() {
            self.metrics
                .insert(java_file.display().to_string(), metrics);
        }
    }

    /// Log everything recorded so far
    pub fn print(&self) {
        tracing::info!(
            "Execution time measurements:\n{}",
            pretty(&self.time_measurements)
        );
        tracing::info!("Total time elapsed: {} seconds", self.total_time);
        tracing::info!(
            "Verification results:\n{}",
            pretty(&self.verification_results)
        );
        tracing::info!("Number of verified programs: {}", pretty(&self.count_verified));
        tracing::info!(
            "Number of not verified programs: {}",
            pretty(&self.count_not_verified)
        );
        tracing::info!("Number of unknown programs: {}", pretty(&self.count_unknown));
        if !self.metrics.is_empty() {
            tracing::info!("Decomposition metrics:\n{}", pretty(&self.metrics));
        }
    }

    pub fn to_run_log(&self, meta: Option<RunMeta>) -> RunLog {
        RunLog {
            meta,
            time_measurements: self.time_measurements.clone(),
            verification_results: self.verification_results.clone(),
            count_verified: self.count_verified.clone(),
            count_not_verified: self.count_not_verified.clone(),
            count_unknown: self.count_unknown.clone(),
            metrics: self.metrics.clone(),
            total_time: self.total_time,
        }
    }

    /// Write the run log to `path`
    pub fn write(&self, path: &Path, meta: Option<RunMeta>) -> Result<(), LogError> {
        write_run_log(path, &self.to_run_log(meta))?;
        tracing::info!("Write measurements to `{}`", path.display());
        Ok(())
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    generate_json(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}
