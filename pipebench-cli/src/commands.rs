//! Command Builders
//!
//! Argument vectors for the external tools. The brbo2 stages go through a
//! launcher script: `scripts/run_deps.sh` puts dependency jars on the
//! classpath, `scripts/run.sh` does not.

use std::path::Path;

/// Launcher without dependency jars
pub const NO_DEPENDENCY_SCRIPT: &str = "./scripts/run.sh";
/// Launcher with dependency jars
pub const WITH_DEPENDENCY_SCRIPT: &str = "./scripts/run_deps.sh";

/// Which fuzzer generates the traces for decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FuzzerMode {
    /// QFuzz modified to maximize resource usage differences
    #[default]
    Qfuzz,
    /// Unmodified QFuzz
    Naive,
}

impl FuzzerMode {
    /// Configuration label used in log paths
    pub fn label(self) -> &'static str {
        match self {
            FuzzerMode::Qfuzz => "modified",
            FuzzerMode::Naive => "naive",
        }
    }
}

/// How the verifier amortizes resource usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AmortizationMode {
    /// Follow the decomposition produced by the pipeline
    Selective,
    /// No amortization: bound each use by its worst case
    Worst,
    /// Amortize every use together
    Fully,
}

impl AmortizationMode {
    /// Value of the verifier's `--amortize` flag
    pub fn as_arg(self) -> &'static str {
        match self {
            AmortizationMode::Selective => "transparent",
            AmortizationMode::Worst => "no",
            AmortizationMode::Fully => "full",
        }
    }

    /// Configuration label used in log paths
    pub fn label(self) -> &'static str {
        match self {
            AmortizationMode::Selective => "selective",
            AmortizationMode::Worst => "worst",
            AmortizationMode::Fully => "fully",
        }
    }
}

fn launcher(deps: bool) -> String {
    if deps {
        WITH_DEPENDENCY_SCRIPT
    } else {
        NO_DEPENDENCY_SCRIPT
    }
    .to_string()
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Translate a Java file into a brbo-compatible form
pub fn translate_command(file: &Path, deps: bool) -> Vec<String> {
    vec![
        launcher(deps),
        "brbo".to_string(),
        "--directory".to_string(),
        path_arg(file),
    ]
}

/// Fuzz `input` for `timeout_secs` seconds
pub fn fuzz_command(
    timeout_secs: u64,
    input: &Path,
    qfuzz: &Path,
    deps: bool,
    mode: FuzzerMode,
) -> Vec<String> {
    let mut command = vec![
        launcher(deps),
        "fuzz".to_string(),
        "--timeout".to_string(),
        timeout_secs.to_string(),
        "--directory".to_string(),
        path_arg(input),
        "--qfuzz".to_string(),
        path_arg(qfuzz),
    ];
    if mode == FuzzerMode::Naive {
        command.push("--naive".to_string());
    }
    command
}

/// Parameters of the decomposition stage
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposeParams {
    pub threads: u32,
    pub samples: u32,
    pub algorithm: String,
    pub parameter: f64,
}

impl Default for DecomposeParams {
    fn default() -> Self {
        Self {
            threads: 4,
            samples: 0,
            algorithm: "optics".to_string(),
            parameter: 0.1,
        }
    }
}

/// Cluster the traces of `input` and emit its decomposition
pub fn decompose_command(params: &DecomposeParams, input: &Path, deps: bool) -> Vec<String> {
    vec![
        launcher(deps),
        "decompose".to_string(),
        "--threads".to_string(),
        params.threads.to_string(),
        "--debug".to_string(),
        "--algorithm".to_string(),
        params.algorithm.clone(),
        "--parameter".to_string(),
        params.parameter.to_string(),
        "--samples".to_string(),
        params.samples.to_string(),
        "--directory".to_string(),
        path_arg(input),
    ]
}

/// Verify `file` with ICRA under the given amortization mode
pub fn verify_command(
    file: &Path,
    icra: &Path,
    deps: bool,
    icra_timeout_secs: u64,
    mode: AmortizationMode,
) -> Vec<String> {
    vec![
        launcher(deps),
        "--directory".to_string(),
        path_arg(file),
        "--amortize".to_string(),
        mode.as_arg().to_string(),
        "--icra-path".to_string(),
        path_arg(icra),
        "--icra-timeout".to_string(),
        icra_timeout_secs.to_string(),
    ]
}

/// Print the commit hash of HEAD
pub fn git_head_command() -> Vec<String> {
    ["git", "log", "--format=%H", "-n", "1"]
        .map(String::from)
        .to_vec()
}

/// Check out `revision`
pub fn git_checkout_command(revision: &str) -> Vec<String> {
    vec!["git".to_string(), "checkout".to_string(), revision.to_string()]
}

/// Build the brbo2 jar
pub fn build_command() -> Vec<String> {
    vec!["sbt".to_string(), "package".to_string()]
}
