#![warn(missing_docs)]
//! # Pipebench
//!
//! Experiment harness for the brbo2 resource-bound verification pipeline.
//!
//! Pipebench drives external tools and post-processes what they print:
//! - **Pipelines**: fuzz with QFuzz, decompose traces, verify with ICRA through brbo
//! - **Process Control**: wall-clock timeouts with SIGTERM/SIGKILL escalation and memory caps
//! - **Run Logs**: one JSON log per run with stage times, verdicts and per-package counts
//! - **Statistics**: normal-approximation confidence intervals over repeated runs
//! - **Tables**: CSV, JSON and terminal output, single configuration or side by side
//!
//! ## Quick Start
//!
//! ```ignore
//! $ pipebench init
//! $ pipebench experiments --input src/main/java/brbo/benchmarks --experiment verifiability --repeat 30
//! $ pipebench data --input output/logs/verifiability/selective --output selective.csv
//! ```

// Re-export the CLI, drivers and process runner
pub use pipebench_cli::{
    AmortizationMode, Cli, CommandRunner, CommandSpec, Commands, ExperimentKind, ExperimentPlan,
    FuzzerMode, PipeConfig, Pipeline, ProcessRunner, RunOutput, RunnerError, StageSettings,
    TimeMeasurement, ToolPaths, classify, decode_fuzzer_input, extract_metrics, run_command,
    run_experiments,
};

// Re-export the log schema and tables
pub use pipebench_report::{
    ComparisonTable, Data, ExperimentTable, OutputFormat, RunLog, RunMeta, SecondaryMetrics,
    StageTimes, Verdict, read_run_log, write_run_log,
};

// Re-export stats
pub use pipebench_stats::{
    AggregatedValue, Aggregation, ConfidenceInterval, IntervalError, SummaryStatistics, aggregate,
    compute_summary, normal_interval,
};

/// Run the Pipebench CLI.
///
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     pipebench::run()
/// }
/// ```
pub use pipebench_cli::run;
