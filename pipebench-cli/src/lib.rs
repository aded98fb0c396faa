#![warn(missing_docs)]
//! Pipebench CLI Library
//!
//! Drives the brbo2 research pipeline (fuzz, decompose, verify) and its brbo
//! baselines through external tools, records one run log per pipeline run,
//! and aggregates run logs into tables.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     pipebench_cli::run()
//! }
//! ```

#[allow(missing_docs)]
mod commands;
mod config;
#[allow(missing_docs)]
mod experiments;
#[allow(missing_docs)]
mod files;
#[allow(missing_docs)]
mod interpreter;
#[allow(missing_docs)]
mod measurement;
#[allow(missing_docs)]
mod pipeline;
#[allow(missing_docs)]
mod runner;

pub use commands::*;
pub use config::*;
pub use experiments::{
    Configuration, ExperimentKind, ExperimentPlan, Variant, configurations, run_experiments,
};
pub use files::{
    DiscoveryError, decomposed_file, get_files, get_java_files, inner_most_package_name,
    remove_stale,
};
pub use interpreter::{DecodeError, classify, decode_fuzzer_input, extract_metrics};
pub use measurement::TimeMeasurement;
pub use pipeline::{Pipeline, StageSettings, ToolPaths};
pub use runner::{CommandRunner, CommandSpec, ProcessRunner, RunOutput, RunnerError};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pipebench_report::{
    ComparisonTable, Data, OutputFormat, format_comparison_human, format_table_human,
    generate_comparison_csv, generate_counts_csv, generate_json, generate_table_csv,
    read_run_log,
};
use pipebench_stats::{CollisionRow, collision_table};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pipebench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "pipebench")]
#[command(author, version, about = "Pipebench - experiment harness for the brbo2 pipeline")]
pub struct Cli {
    /// What to run
    #[command(subcommand)]
    pub command: Commands,

    /// Print the commands without executing them
    #[arg(long, global = true)]
    pub dry: bool,

    /// Configuration file (discovered from the current directory if not specified)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Tool locations; each overrides `[paths]` in pipebench.toml
#[derive(Args, Debug, Clone, Default)]
pub struct ToolArgs {
    /// The directory of brbo2 (fuzzing and decomposition run here)
    #[arg(long)]
    pub brbo2: Option<String>,

    /// The directory of brbo (verification runs here)
    #[arg(long)]
    pub brbo: Option<String>,

    /// The directory of QFuzz
    #[arg(long)]
    pub qfuzz: Option<String>,

    /// The ICRA executable
    #[arg(long)]
    pub icra: Option<String>,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the brbo2 pipeline: fuzz, decompose, verify
    Brbo2 {
        /// The file or the directory to analyze
        #[arg(long)]
        input: PathBuf,

        /// The file to write the measurements to
        #[arg(long)]
        log: Option<PathBuf>,

        /// Which fuzzer generates the traces
        #[arg(long, value_enum, default_value = "qfuzz")]
        mode: FuzzerMode,

        /// The fuzzing budget in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Randomly generated inputs used for decomposition
        #[arg(long)]
        samples: Option<u32>,

        /// Build brbo2 at this git revision first (`master` = current HEAD)
        #[arg(long)]
        revision: Option<String>,

        #[allow(missing_docs)]
        #[command(flatten)]
        tools: ToolArgs,
    },
    /// Run the brbo baseline: translate, verify without decomposition
    Brbo {
        /// The file or the directory to analyze
        #[arg(long)]
        input: PathBuf,

        /// The amortization mode (worst or fully)
        #[arg(long, value_enum)]
        mode: AmortizationMode,

        /// The ICRA budget in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// The file to write the measurements to
        #[arg(long)]
        log: Option<PathBuf>,

        #[allow(missing_docs)]
        #[command(flatten)]
        tools: ToolArgs,
    },
    /// Repeat experiments, writing one run log per configuration and run
    Experiments {
        /// The file or the directory to run experiments against
        #[arg(long)]
        input: PathBuf,

        /// Which experiment to run
        #[arg(long, value_enum)]
        experiment: ExperimentKind,

        /// The number of times to repeat the experiment
        #[arg(long)]
        repeat: Option<u32>,

        /// Root directory for run logs
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Build brbo2 at this git revision first (`master` = current HEAD)
        #[arg(long)]
        revision: Option<String>,

        #[allow(missing_docs)]
        #[command(flatten)]
        tools: ToolArgs,
    },
    /// Aggregate run logs into a table
    Data {
        /// A run log or a directory of run logs
        #[arg(long)]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: csv, json, human
        #[arg(long, default_value = "csv")]
        format: String,

        /// Table label (defaults to the input's name)
        #[arg(long)]
        label: Option<String>,
    },
    /// Line up several configurations file by file
    Compare {
        /// Run log directories as `label=dir` (or `dir`, labelled by its name)
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: human, csv, json
        #[arg(long, default_value = "human")]
        format: String,
    },
    /// Count lines of every Java file, as CSV
    CountLines {
        /// The directory to search for Java files
        #[arg(long)]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Tabulate array-element collision probabilities
    Collision {
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: human, csv
        #[arg(long, default_value = "human")]
        format: String,
    },
    /// Print the integers a fuzz driver reads from a fuzzer queue file
    DecodeInput {
        /// The queue file
        file: PathBuf,

        /// Smallest value an input may take
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        min: i32,

        /// Largest value an input may take
        #[arg(long, default_value = "30", allow_hyphen_values = true)]
        max: i32,
    },
    /// Write a default pipebench.toml into the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the Pipebench CLI with the process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Pipebench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose);
    print_args(&cli);

    let config = match cli.config {
        Some(ref path) => PipeConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PipeConfig::discover().unwrap_or_default(),
    };

    let runner = ProcessRunner::new(
        cli.dry,
        Duration::from_nanos(
            PipeConfig::parse_duration(&config.pipeline.grace_period)
                .context("Invalid grace_period")?,
        ),
    );

    run_command(&cli, &config, &runner)
}

/// Dispatch a parsed command against `runner`.
///
/// Split from [`run_with_cli`] so callers can substitute the runner.
pub fn run_command(cli: &Cli, config: &PipeConfig, runner: &dyn CommandRunner) -> anyhow::Result<()> {
    match cli.command {
        Commands::Brbo2 {
            ref input,
            ref log,
            mode,
            timeout,
            samples,
            ref revision,
            ref tools,
        } => {
            let mut settings = StageSettings::from_config(&config.pipeline)?;
            if let Some(timeout) = timeout {
                settings.fuzz_timeout_secs = timeout;
            }
            if let Some(samples) = samples {
                settings.decompose.samples = samples;
            }
            let pipeline = Pipeline::new(runner, tool_paths(config, tools)?, settings, cli.dry);
            let commit = match revision.as_deref() {
                Some(revision) => pipeline.pin_version(revision)?,
                None => None,
            };

            let files = get_java_files(input)?;
            let measurement = pipeline.run_brbo2(&files, mode)?;
            if let Some(log) = log {
                measurement.write(log, Some(pipeline.run_meta("brbo2", mode.label(), commit)))?;
            }
        }
        Commands::Brbo {
            ref input,
            mode,
            timeout,
            ref log,
            ref tools,
        } => {
            let mut settings = StageSettings::from_config(&config.pipeline)?;
            if let Some(timeout) = timeout {
                settings.icra_timeout_secs = timeout;
            }
            let pipeline = Pipeline::new(runner, tool_paths(config, tools)?, settings, cli.dry);

            let files = get_java_files(input)?;
            let measurement = pipeline.run_brbo(&files, mode)?;
            if let Some(log) = log {
                measurement.write(log, Some(pipeline.run_meta("brbo", mode.label(), None)))?;
            }
        }
        Commands::Experiments {
            ref input,
            experiment,
            repeat,
            ref log_dir,
            ref revision,
            ref tools,
        } => {
            let settings = StageSettings::from_config(&config.pipeline)?;
            let pipeline = Pipeline::new(runner, tool_paths(config, tools)?, settings, cli.dry);
            let plan = ExperimentPlan {
                kind: experiment,
                repeat: repeat.unwrap_or(config.experiments.repeat),
                timeouts: config.experiments.timeouts.clone(),
                log_dir: log_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(&config.experiments.log_dir)),
                version: revision.clone(),
            };

            let files = get_java_files(input)?;
            let written = run_experiments(&pipeline, &plan, &files)?;
            tracing::info!("Wrote {} run logs under {}", written.len(), plan.log_dir.display());
        }
        Commands::Data {
            ref input,
            ref output,
            ref format,
            ref label,
        } => {
            let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;
            let label = label.clone().unwrap_or_else(|| file_label(input));
            let data = read_data(input)?;
            for (name, samples) in data.raw() {
                tracing::debug!("{}:\n{}", name, generate_json(samples)?);
            }

            let table = data
                .transform(&label, config.stats.confidence_level)
                .context("Failed to aggregate run logs")?;
            tracing::info!("Aggregated {} run logs of `{}`", table.run_logs, label);
            tracing::debug!("Transformed:\n{}", generate_json(&table)?);
            let rendered = match format {
                OutputFormat::Csv => generate_table_csv(&table),
                OutputFormat::Json => generate_json(&table)?,
                OutputFormat::Human => format_table_human(&table),
            };
            write_output(output.as_deref(), &rendered)?;
        }
        Commands::Compare {
            ref inputs,
            ref output,
            ref format,
        } => {
            let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;
            let tables = inputs
                .iter()
                .map(|spec| {
                    let (label, dir) = parse_labelled_input(spec);
                    let data = read_data(&dir)?;
                    data.transform(&label, config.stats.confidence_level)
                        .with_context(|| format!("Failed to aggregate `{}`", label))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let comparison = ComparisonTable::from_tables(&tables);
            let rendered = match format {
                OutputFormat::Csv => generate_comparison_csv(&comparison),
                OutputFormat::Json => generate_json(&comparison)?,
                OutputFormat::Human => format_comparison_human(&comparison),
            };
            write_output(output.as_deref(), &rendered)?;
        }
        Commands::CountLines {
            ref input,
            ref output,
        } => {
            let counts = count_lines(input)?;
            write_output(output.as_deref(), &generate_counts_csv(("file", "lines"), &counts))?;
        }
        Commands::Collision {
            ref output,
            ref format,
        } => {
            let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;
            let sizes: Vec<u64> = (2..=14).collect();
            let rows = collision_table(&[9, 50, 100, 1000], &sizes);
            let rendered = match format {
                OutputFormat::Csv => collision_csv(&rows),
                OutputFormat::Human => collision_human(&rows),
                OutputFormat::Json => anyhow::bail!("The collision table is available as human or csv"),
            };
            write_output(output.as_deref(), &rendered)?;
        }
        Commands::DecodeInput { ref file, min, max } => {
            let bytes =
                std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
            let values = decode_fuzzer_input(&bytes, min, max)?;
            let rendered: Vec<String> = values.iter().map(i32::to_string).collect();
            println!("{}", rendered.join(", "));
        }
        Commands::Init { force } => {
            let path = PathBuf::from(CONFIG_FILE_NAME);
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            std::fs::write(&path, PipeConfig::default_toml())?;
            eprintln!("Configuration written to: {}", path.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "pipebench=debug,pipebench_cli=debug"
    } else {
        "pipebench=info,pipebench_cli=info"
    };
    // Already installed when called more than once in a process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_args(cli: &Cli) {
    tracing::info!("Arguments:");
    tracing::info!("dry\t{}", cli.dry);
    tracing::info!("verbose\t{}", cli.verbose);
    if let Some(ref config) = cli.config {
        tracing::info!("config\t{}", config.display());
    }
    tracing::info!("command\t{:?}", cli.command);
}

/// CLI tool paths win over `[paths]`
fn tool_paths(config: &PipeConfig, tools: &ToolArgs) -> anyhow::Result<ToolPaths> {
    let mut paths = config.paths.clone();
    if let Some(ref brbo2) = tools.brbo2 {
        paths.brbo2 = brbo2.clone();
    }
    if let Some(ref brbo) = tools.brbo {
        paths.brbo = brbo.clone();
    }
    if let Some(ref qfuzz) = tools.qfuzz {
        paths.qfuzz = qfuzz.clone();
    }
    if let Some(ref icra) = tools.icra {
        paths.icra = icra.clone();
    }
    ToolPaths::from_config(&paths)
}

/// Load every run log under `input`
fn read_data(input: &Path) -> anyhow::Result<Data> {
    let mut data = Data::new();
    for log_file in get_files(input, "", "json")? {
        tracing::info!("Read from {}", log_file.display());
        data.insert_run_log(&read_run_log(&log_file)?);
    }
    Ok(data)
}

/// `label=dir`, or `dir` labelled by its last component
fn parse_labelled_input(spec: &str) -> (String, PathBuf) {
    match spec.split_once('=') {
        Some((label, dir)) if !label.is_empty() => (label.to_string(), PathBuf::from(dir)),
        _ => {
            let dir = PathBuf::from(spec);
            (file_label(&dir), dir)
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Lines per Java file, keyed by file stem
fn count_lines(input: &Path) -> anyhow::Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for java_file in get_java_files(input)? {
        let content = std::fs::read_to_string(&java_file)
            .with_context(|| format!("Failed to read {}", java_file.display()))?;
        counts.insert(file_label(&java_file), content.lines().count());
    }
    Ok(counts)
}

fn collision_human(rows: &[CollisionRow]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "Range {}. Array size: {}. Collision probability: {:.2}%. Subset selection complexity: {} (x{:.2}).\n",
                row.array_element_range,
                row.array_size,
                row.probability * 100.0,
                row.subset_selection,
                row.multiplier
            )
        })
        .collect()
}

fn collision_csv(rows: &[CollisionRow]) -> String {
    let mut output =
        String::from("array_element_range,array_size,probability,subset_selection,multiplier\n");
    for row in rows {
        output.push_str(&format!(
            "{},{},{:.6},{},{:.4}\n",
            row.array_element_range,
            row.array_size,
            row.probability,
            row.subset_selection,
            row.multiplier
        ));
    }
    output
}

fn write_output(path: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::File::create(path)?;
            file.write_all(content.as_bytes())?;
            eprintln!("Output written to: {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "pipebench", "brbo2", "--input", "src/stac", "--mode", "naive", "--timeout", "60", "--dry",
        ])
        .unwrap();
        assert!(cli.dry);
        match cli.command {
            Commands::Brbo2 { mode, timeout, .. } => {
                assert_eq!(mode, FuzzerMode::Naive);
                assert_eq!(timeout, Some(60));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from([
            "pipebench", "experiments", "--input", "x", "--experiment", "all", "--repeat", "30",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Experiments {
                experiment: ExperimentKind::All,
                repeat: Some(30),
                ..
            }
        ));

        assert!(Cli::try_parse_from(["pipebench", "brbo", "--input", "x", "--mode", "best"]).is_err());
    }

    #[test]
    fn test_decode_input_accepts_negative_bounds() {
        let cli = Cli::try_parse_from(["pipebench", "decode-input", "q.bin", "--min", "-5", "--max", "5"])
            .unwrap();
        assert!(matches!(cli.command, Commands::DecodeInput { min: -5, max: 5, .. }));
    }

    #[test]
    fn test_parse_labelled_input() {
        assert_eq!(
            parse_labelled_input("worst=output/logs/verifiability/worst"),
            ("worst".to_string(), PathBuf::from("output/logs/verifiability/worst"))
        );
        assert_eq!(
            parse_labelled_input("output/logs/qfuzz/naive"),
            ("naive".to_string(), PathBuf::from("output/logs/qfuzz/naive"))
        );
    }

    #[test]
    fn test_count_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.java"), "class A {\n}\n").unwrap();
        std::fs::write(dir.path().join("B.java"), "class B {}").unwrap();
        std::fs::write(dir.path().join("README"), "ignored\n").unwrap();

        let counts = count_lines(dir.path()).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["A"], 2);
        assert_eq!(counts["B"], 1);
    }

    #[test]
    fn test_collision_rendering() {
        let rows = collision_table(&[9], &[2, 3]);
        let human = collision_human(&rows);
        assert!(human.starts_with(
            "Range 9. Array size: 2. Collision probability: 11.11%. Subset selection complexity: 10 (x0.00)."
        ));
        assert!(human.contains("Subset selection complexity: 41 (x4.10)."));

        let csv = collision_csv(&rows);
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().nth(1).unwrap().starts_with("9,2,0.111111,10,"));
    }

    #[test]
    fn test_tool_paths_override() {
        let config = PipeConfig::default();
        let tools = ToolArgs {
            icra: Some("/opt/icra".to_string()),
            ..Default::default()
        };
        let paths = tool_paths(&config, &tools).unwrap();
        assert_eq!(paths.icra, PathBuf::from("/opt/icra"));
        assert_eq!(paths.brbo2, std::env::current_dir().unwrap());
    }
}
