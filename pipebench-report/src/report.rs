//! Report Data Structures
//!
//! [`RunLog`] is written once per pipeline run and read back by the
//! aggregation commands; its field names are the on-disk schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Verification outcome derived from verifier output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// The verifier proved the bound
    #[serde(rename = "verified")]
    Verified,
    /// The verifier refuted the bound
    #[serde(rename = "not verified")]
    NotVerified,
    /// No verdict marker (timeout, crash, dry run)
    #[serde(rename = "unknown")]
    Unknown,
}

impl Verdict {
    /// Log/table spelling
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Verified => "verified",
            Verdict::NotVerified => "not verified",
            Verdict::Unknown => "unknown",
        }
    }

    /// 1.0 for verified, 0.0 otherwise
    pub fn as_sample(self) -> f64 {
        if self == Verdict::Verified { 1.0 } else { 0.0 }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock seconds spent in each stage for one file.
///
/// Serialized as a `[fuzz, decompose, verify]` array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimes(pub f64, pub f64, pub f64);

impl StageTimes {
    /// Build from per-stage seconds
    pub fn new(fuzz: f64, decompose: f64, verify: f64) -> Self {
        Self(fuzz, decompose, verify)
    }

    /// Verification only (baseline pipelines skip fuzzing and decomposition)
    pub fn verification_only(verify: f64) -> Self {
        Self(0.0, 0.0, verify)
    }

    /// Fuzzing seconds
    pub fn fuzz(&self) -> f64 {
        self.0
    }

    /// Decomposition seconds
    pub fn decompose(&self) -> f64 {
        self.1
    }

    /// Verification seconds
    pub fn verify(&self) -> f64 {
        self.2
    }

    /// Sum over all stages
    pub fn total(&self) -> f64 {
        self.0 + self.1 + self.2
    }
}

/// Counts scraped from decomposition output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryMetrics {
    /// Number of trace clusters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<u64>,
    /// Number of predicates in the decision boundary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicates: Option<u64>,
}

impl SecondaryMetrics {
    /// Whether nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.clusters.is_none() && self.predicates.is_none()
    }
}

/// Run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    /// Pipebench version that produced the log
    pub version: String,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Pipeline that ran (`brbo2`, `brbo`)
    pub pipeline: String,
    /// Experiment configuration label (e.g. `selective`, `naive`, `timeout-30`)
    pub configuration: String,
    /// brbo2 commit the run was built from, when pinned
    #[serde(default)]
    pub git_commit: Option<String>,
    /// Whether commands were only printed
    #[serde(default)]
    pub dry: bool,
}

/// Measurements of one pipeline run over a set of input files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunLog {
    /// Absent in logs produced before metadata was recorded
    #[serde(default)]
    pub meta: Option<RunMeta>,
    /// Per-file stage times
    pub time_measurements: BTreeMap<String, StageTimes>,
    /// Per-file verdicts
    pub verification_results: BTreeMap<String, Verdict>,
    /// Verified files per innermost package
    #[serde(default)]
    pub count_verified: BTreeMap<String, u64>,
    /// Refuted files per innermost package
    #[serde(default)]
    pub count_not_verified: BTreeMap<String, u64>,
    /// Undecided files per innermost package
    #[serde(default)]
    pub count_unknown: BTreeMap<String, u64>,
    /// Per-file decomposition metrics
    #[serde(default)]
    pub metrics: BTreeMap<String, SecondaryMetrics>,
    /// Sum of all stage times
    #[serde(default)]
    pub total_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_wire_names() {
        assert_eq!(
            serde_json::to_string(&Verdict::NotVerified).unwrap(),
            "\"not verified\""
        );
        let verdict: Verdict = serde_json::from_str("\"verified\"").unwrap();
        assert_eq!(verdict, Verdict::Verified);
        assert_eq!(Verdict::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_stage_times_is_an_array() {
        let json = serde_json::to_string(&StageTimes::new(1.5, 2.0, 3.0)).unwrap();
        assert_eq!(json, "[1.5,2.0,3.0]");
        assert_eq!(StageTimes::new(1.5, 2.0, 3.0).total(), 6.5);
    }

    #[test]
    fn test_minimal_log_parses() {
        // Logs written without metadata or per-package counts
        let json = r#"{
            "time_measurements": {"/b/stac/T.java": [0, 0, 4.5]},
            "verification_results": {"/b/stac/T.java": "unknown"}
        }"#;
        let log: RunLog = serde_json::from_str(json).unwrap();
        assert!(log.meta.is_none());
        assert_eq!(log.time_measurements["/b/stac/T.java"].verify(), 4.5);
        assert_eq!(log.verification_results["/b/stac/T.java"], Verdict::Unknown);
        assert!(log.count_verified.is_empty());
    }
}
