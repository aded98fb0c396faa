//! Configuration loading from pipebench.toml
//!
//! Pipebench configuration can be specified in a `pipebench.toml` file in the
//! project root. The configuration is discovered by walking up from the
//! current directory; command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up during discovery
pub const CONFIG_FILE_NAME: &str = "pipebench.toml";

/// Pipebench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipeConfig {
    /// Locations of the external tools
    #[serde(default)]
    pub paths: PathsConfig,
    /// Stage parameters
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Repeated-run experiments
    #[serde(default)]
    pub experiments: ExperimentsConfig,
    /// Aggregation
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Locations of the external tools (`~` is expanded)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// brbo2 checkout; fuzzing and decomposition run here
    #[serde(default = "default_brbo2")]
    pub brbo2: String,
    /// brbo checkout; verification runs here
    #[serde(default = "default_brbo")]
    pub brbo: String,
    /// QFuzz installation
    #[serde(default = "default_qfuzz")]
    pub qfuzz: String,
    /// ICRA executable
    #[serde(default = "default_icra")]
    pub icra: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            brbo2: default_brbo2(),
            brbo: default_brbo(),
            qfuzz: default_qfuzz(),
            icra: default_icra(),
        }
    }
}

fn default_brbo2() -> String {
    ".".to_string()
}
fn default_brbo() -> String {
    "~/brbo-impl".to_string()
}
fn default_qfuzz() -> String {
    "~/Documents/workspace/qfuzz_docker".to_string()
}
fn default_icra() -> String {
    "~/Documents/workspace/icra/icra".to_string()
}

/// Stage parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fuzzing budget passed to QFuzz (e.g., "30s")
    #[serde(default = "default_fuzz_timeout")]
    pub fuzz_timeout: String,
    /// Threads used by the decomposition stage
    #[serde(default = "default_decompose_threads")]
    pub decompose_threads: u32,
    /// Randomly generated inputs used for decomposition (0 disables)
    #[serde(default)]
    pub samples: u32,
    /// Clustering algorithm
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Clustering parameter
    #[serde(default = "default_parameter")]
    pub parameter: f64,
    /// Budget passed to ICRA (e.g., "60s")
    #[serde(default = "default_icra_timeout")]
    pub icra_timeout: String,
    /// Use the launcher script that puts dependency jars on the classpath
    #[serde(default = "default_deps")]
    pub deps: bool,
    /// Wall-clock limit for any single stage, enforced by the runner
    #[serde(default)]
    pub stage_timeout: Option<String>,
    /// Time between SIGTERM and SIGKILL once a stage times out
    #[serde(default = "default_grace_period")]
    pub grace_period: String,
    /// Address-space cap for the verification stage, in MiB
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fuzz_timeout: default_fuzz_timeout(),
            decompose_threads: default_decompose_threads(),
            samples: 0,
            algorithm: default_algorithm(),
            parameter: default_parameter(),
            icra_timeout: default_icra_timeout(),
            deps: default_deps(),
            stage_timeout: None,
            grace_period: default_grace_period(),
            memory_limit_mb: None,
        }
    }
}

fn default_fuzz_timeout() -> String {
    "30s".to_string()
}
fn default_decompose_threads() -> u32 {
    4
}
fn default_algorithm() -> String {
    "optics".to_string()
}
fn default_parameter() -> f64 {
    0.1
}
fn default_icra_timeout() -> String {
    "60s".to_string()
}
fn default_deps() -> bool {
    true
}
fn default_grace_period() -> String {
    "500ms".to_string()
}

/// Repeated-run experiments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentsConfig {
    /// Repetitions per configuration
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    /// Fuzzing budgets (seconds) swept by the timeout experiment
    #[serde(default = "default_timeouts")]
    pub timeouts: Vec<u64>,
    /// Root directory for run logs
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for ExperimentsConfig {
    fn default() -> Self {
        Self {
            repeat: default_repeat(),
            timeouts: default_timeouts(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_repeat() -> u32 {
    3
}
fn default_timeouts() -> Vec<u64> {
    vec![30, 60, 90]
}
fn default_log_dir() -> String {
    "output/logs".to_string()
}

/// Aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Confidence level for time intervals (e.g., 0.95)
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            confidence_level: default_confidence_level(),
        }
    }
}

fn default_confidence_level() -> f64 {
    pipebench_stats::DEFAULT_CONFIDENCE_LEVEL
}

impl PipeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("Ignoring {}: {}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Pipebench Configuration

[paths]
# brbo2 checkout (fuzzing and decomposition run here)
brbo2 = "."
# brbo checkout (verification runs here)
brbo = "~/brbo-impl"
# QFuzz installation
qfuzz = "~/Documents/workspace/qfuzz_docker"
# ICRA executable
icra = "~/Documents/workspace/icra/icra"

[pipeline]
# Fuzzing budget passed to QFuzz
fuzz_timeout = "30s"
# Threads used by the decomposition stage
decompose_threads = 4
# Randomly generated inputs for decomposition (0 disables the naive generator)
samples = 0
# Clustering algorithm and parameter
algorithm = "optics"
parameter = 0.1
# Budget passed to ICRA
icra_timeout = "60s"
# Launch through scripts/run_deps.sh instead of scripts/run.sh
deps = true
# Wall-clock limit per stage (uncomment to enable)
# stage_timeout = "10m"
# Time between SIGTERM and SIGKILL on timeout
grace_period = "500ms"
# Address-space cap for verification in MiB (uncomment to enable)
# memory_limit_mb = 8192

[experiments]
# Repetitions per configuration
repeat = 3
# Fuzzing budgets swept by the timeout experiment (seconds)
timeouts = [30, 60, 90]
# Root directory for run logs
log_dir = "output/logs"

[stats]
# Confidence level (0.0 to 1.0)
confidence_level = 0.95
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }

    /// Parse a duration string to whole seconds (rounded up)
    pub fn parse_seconds(s: &str) -> anyhow::Result<u64> {
        let nanos = Self::parse_duration(s)?;
        Ok(nanos.div_ceil(1_000_000_000))
    }
}

/// Expand a leading `~` to `$HOME`
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipeConfig::default();
        assert_eq!(config.pipeline.fuzz_timeout, "30s");
        assert_eq!(config.pipeline.decompose_threads, 4);
        assert_eq!(config.experiments.timeouts, vec![30, 60, 90]);
        assert!(config.pipeline.deps);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(PipeConfig::parse_duration("3s").unwrap(), 3_000_000_000);
        assert_eq!(PipeConfig::parse_duration("500ms").unwrap(), 500_000_000);
        assert_eq!(PipeConfig::parse_duration("100us").unwrap(), 100_000);
        assert_eq!(PipeConfig::parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(PipeConfig::parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert_eq!(PipeConfig::parse_duration("45").unwrap(), 45_000_000_000);
        assert!(PipeConfig::parse_duration("3h").is_err());
        assert!(PipeConfig::parse_duration("").is_err());
    }

    #[test]
    fn test_parse_seconds_rounds_up() {
        assert_eq!(PipeConfig::parse_seconds("60s").unwrap(), 60);
        assert_eq!(PipeConfig::parse_seconds("1500ms").unwrap(), 2);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [pipeline]
            fuzz_timeout = "90s"
            memory_limit_mb = 4096

            [experiments]
            repeat = 30
        "#;

        let config: PipeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pipeline.fuzz_timeout, "90s");
        assert_eq!(config.pipeline.memory_limit_mb, Some(4096));
        assert_eq!(config.experiments.repeat, 30);
        // Defaults should still apply
        assert_eq!(config.pipeline.icra_timeout, "60s");
        assert_eq!(config.paths.brbo, "~/brbo-impl");
    }

    #[test]
    fn test_default_toml_parses() {
        let config: PipeConfig = toml::from_str(&PipeConfig::default_toml()).unwrap();
        assert_eq!(config.pipeline.algorithm, "optics");
        assert!((config.stats.confidence_level - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/opt/icra"), PathBuf::from("/opt/icra"));
        assert_eq!(expand_tilde("rel/dir"), PathBuf::from("rel/dir"));
    }
}
