//! Repeated-run experiments
//!
//! Each experiment is a set of pipeline configurations. Every configuration
//! runs `repeat` times and each run writes its own log to
//! `<log_dir>/<experiment>/<configuration>/run-<i>.json`.

use crate::commands::{AmortizationMode, FuzzerMode};
use crate::pipeline::Pipeline;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Fuzzing budget of brbo2 in the verifiability experiment
pub const VERIFIABILITY_FUZZ_TIMEOUT_SECS: u64 = 60;

/// Which experiment to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExperimentKind {
    /// Selective amortization against the worst-case and fully amortized baselines
    Verifiability,
    /// Modified QFuzz against unmodified QFuzz
    Qfuzz,
    /// Sweep of fuzzing budgets
    Timeout,
    /// Every experiment above
    All,
}

impl ExperimentKind {
    pub fn name(self) -> &'static str {
        match self {
            ExperimentKind::Verifiability => "verifiability",
            ExperimentKind::Qfuzz => "qfuzz",
            ExperimentKind::Timeout => "timeout",
            ExperimentKind::All => "all",
        }
    }

    fn expand(self) -> Vec<ExperimentKind> {
        match self {
            ExperimentKind::All => vec![
                ExperimentKind::Verifiability,
                ExperimentKind::Qfuzz,
                ExperimentKind::Timeout,
            ],
            kind => vec![kind],
        }
    }
}

/// What a configuration runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// The brbo2 pipeline; `fuzz_timeout_secs` overrides the configured budget
    Brbo2 {
        fuzzer: FuzzerMode,
        fuzz_timeout_secs: Option<u64>,
    },
    /// The brbo baseline
    Brbo { mode: AmortizationMode },
}

impl Variant {
    pub fn pipeline_name(&self) -> &'static str {
        match self {
            Variant::Brbo2 { .. } => "brbo2",
            Variant::Brbo { .. } => "brbo",
        }
    }
}

/// One configuration of an experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub experiment: &'static str,
    pub label: String,
    pub variant: Variant,
}

impl Configuration {
    fn brbo2(experiment: &'static str, label: impl Into<String>, fuzzer: FuzzerMode, timeout: Option<u64>) -> Self {
        Self {
            experiment,
            label: label.into(),
            variant: Variant::Brbo2 {
                fuzzer,
                fuzz_timeout_secs: timeout,
            },
        }
    }

    fn brbo(experiment: &'static str, mode: AmortizationMode) -> Self {
        Self {
            experiment,
            label: mode.label().to_string(),
            variant: Variant::Brbo { mode },
        }
    }

    /// Log path of run `run` (1-based)
    pub fn log_path(&self, log_dir: &Path, run: u32) -> PathBuf {
        log_dir
            .join(self.experiment)
            .join(&self.label)
            .join(format!("run-{}.json", run))
    }
}

/// Configurations making up `kind`; `timeouts` drives the timeout sweep
pub fn configurations(kind: ExperimentKind, timeouts: &[u64]) -> Vec<Configuration> {
    let mut configurations = Vec::new();
    for kind in kind.expand() {
        let experiment = kind.name();
        match kind {
            ExperimentKind::Verifiability => {
                configurations.push(Configuration::brbo2(
                    experiment,
                    AmortizationMode::Selective.label(),
                    FuzzerMode::Qfuzz,
                    Some(VERIFIABILITY_FUZZ_TIMEOUT_SECS),
                ));
                configurations.push(Configuration::brbo(experiment, AmortizationMode::Worst));
                configurations.push(Configuration::brbo(experiment, AmortizationMode::Fully));
            }
            ExperimentKind::Qfuzz => {
                for fuzzer in [FuzzerMode::Qfuzz, FuzzerMode::Naive] {
                    configurations.push(Configuration::brbo2(experiment, fuzzer.label(), fuzzer, None));
                }
            }
            ExperimentKind::Timeout => {
                for &timeout in timeouts {
                    configurations.push(Configuration::brbo2(
                        experiment,
                        format!("timeout-{}", timeout),
                        FuzzerMode::Qfuzz,
                        Some(timeout),
                    ));
                }
            }
            ExperimentKind::All => {}
        }
    }
    configurations
}

/// Options of an experiment invocation
#[derive(Debug, Clone)]
pub struct ExperimentPlan {
    pub kind: ExperimentKind,
    pub repeat: u32,
    pub timeouts: Vec<u64>,
    pub log_dir: PathBuf,
    /// brbo2 revision to build first; `None` skips pinning
    pub version: Option<String>,
}

/// Run every configuration `repeat` times. Returns the logs written.
pub fn run_experiments(pipeline: &Pipeline<'_>, plan: &ExperimentPlan, files: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let configurations = configurations(plan.kind, &plan.timeouts);
    let commit = match plan.version.as_deref() {
        Some(version) => pipeline.pin_version(version)?,
        None => None,
    };

    let mut written = Vec::new();
    for run in 1..=plan.repeat {
        tracing::info!("Run {} of {}", run, plan.repeat);
        for configuration in &configurations {
            tracing::info!(
                "Experiment `{}`: configuration `{}`",
                configuration.experiment,
                configuration.label
            );
            let measurement = match configuration.variant {
                Variant::Brbo2 {
                    fuzzer,
                    fuzz_timeout_secs,
                } => {
                    let mut settings = pipeline.settings().clone();
                    if let Some(timeout) = fuzz_timeout_secs {
                        settings.fuzz_timeout_secs = timeout;
                    }
                    pipeline.with_settings(settings).run_brbo2(files, fuzzer)?
                }
                Variant::Brbo { mode } => pipeline.run_brbo(files, mode)?,
            };

            let path = configuration.log_path(&plan.log_dir, run);
            let meta = pipeline.run_meta(
                configuration.variant.pipeline_name(),
                &configuration.label,
                commit.clone(),
            );
            measurement
                .write(&path, Some(meta))
                .with_context(|| format!("Failed to write run log for `{}`", configuration.label))?;
            written.push(path);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(kind: ExperimentKind) -> Vec<String> {
        configurations(kind, &[30, 60, 90])
            .into_iter()
            .map(|c| format!("{}/{}", c.experiment, c.label))
            .collect()
    }

    #[test]
    fn test_configurations() {
        assert_eq!(
            labels(ExperimentKind::Verifiability),
            vec!["verifiability/selective", "verifiability/worst", "verifiability/fully"]
        );
        assert_eq!(labels(ExperimentKind::Qfuzz), vec!["qfuzz/modified", "qfuzz/naive"]);
        assert_eq!(
            labels(ExperimentKind::Timeout),
            vec!["timeout/timeout-30", "timeout/timeout-60", "timeout/timeout-90"]
        );
    }

    #[test]
    fn test_all_runs_every_experiment() {
        let all = labels(ExperimentKind::All);
        assert_eq!(all.len(), 8);
        assert_eq!(all[0], "verifiability/selective");
        assert_eq!(all[7], "timeout/timeout-90");
    }

    #[test]
    fn test_variants_and_log_path() {
        let configs = configurations(ExperimentKind::Timeout, &[45]);
        assert_eq!(
            configs[0].variant,
            Variant::Brbo2 {
                fuzzer: FuzzerMode::Qfuzz,
                fuzz_timeout_secs: Some(45)
            }
        );
        assert_eq!(
            configs[0].log_path(Path::new("output/logs"), 2),
            PathBuf::from("output/logs/timeout/timeout-45/run-2.json")
        );

        let verifiability = configurations(ExperimentKind::Verifiability, &[]);
        assert_eq!(
            verifiability[0].variant,
            Variant::Brbo2 {
                fuzzer: FuzzerMode::Qfuzz,
                fuzz_timeout_secs: Some(60)
            }
        );
        assert_eq!(verifiability[1].variant.pipeline_name(), "brbo");

        // The qfuzz experiment keeps the configured budget
        let qfuzz = configurations(ExperimentKind::Qfuzz, &[]);
        assert!(matches!(
            qfuzz[0].variant,
            Variant::Brbo2 {
                fuzz_timeout_secs: None,
                ..
            }
        ));
    }
}
