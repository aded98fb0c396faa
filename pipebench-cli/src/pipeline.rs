//! Pipeline drivers
//!
//! `brbo2`: fuzz, decompose, then verify the decomposition with selective
//! amortization. `brbo`: translate, then verify without a decomposition
//! under worst-case or full amortization. Both run one file at a time and
//! collect a [`TimeMeasurement`].

use crate::commands::{
    AmortizationMode, DecomposeParams, FuzzerMode, build_command, decompose_command, fuzz_command,
    git_checkout_command, git_head_command, translate_command, verify_command,
};
use crate::config::{PathsConfig, PipeConfig, PipelineConfig, expand_tilde};
use crate::files::{decomposed_file, remove_stale};
use crate::measurement::TimeMeasurement;
use crate::runner::{CommandRunner, CommandSpec, RunOutput};
use anyhow::{Context, bail};
use indicatif::{ProgressBar, ProgressStyle};
use pipebench_report::{RunMeta, StageTimes};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Absolute locations of the external tools
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    pub brbo2: PathBuf,
    pub brbo: PathBuf,
    pub qfuzz: PathBuf,
    pub icra: PathBuf,
}

impl ToolPaths {
    /// Expand `~` and anchor relative paths at the current directory
    pub fn from_config(paths: &PathsConfig) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("Failed to resolve the current directory")?;
        let resolve = |path: &str| cwd.join(expand_tilde(path));
        Ok(Self {
            brbo2: resolve(&paths.brbo2),
            brbo: resolve(&paths.brbo),
            qfuzz: resolve(&paths.qfuzz),
            icra: resolve(&paths.icra),
        })
    }
}

/// Stage parameters with durations already parsed
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    pub fuzz_timeout_secs: u64,
    pub decompose: DecomposeParams,
    pub icra_timeout_secs: u64,
    pub deps: bool,
    /// Wall-clock limit the runner enforces on every stage
    pub stage_timeout: Option<Duration>,
    /// Address-space cap for verification, in bytes
    pub memory_limit: Option<u64>,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            fuzz_timeout_secs: 30,
            decompose: DecomposeParams::default(),
            icra_timeout_secs: 60,
            deps: true,
            stage_timeout: None,
            memory_limit: None,
        }
    }
}

impl StageSettings {
    pub fn from_config(pipeline: &PipelineConfig) -> anyhow::Result<Self> {
        let stage_timeout = pipeline
            .stage_timeout
            .as_deref()
            .map(PipeConfig::parse_duration)
            .transpose()
            .context("Invalid stage_timeout")?
            .map(Duration::from_nanos);

        Ok(Self {
            fuzz_timeout_secs: PipeConfig::parse_seconds(&pipeline.fuzz_timeout)
                .context("Invalid fuzz_timeout")?,
            decompose: DecomposeParams {
                threads: pipeline.decompose_threads,
                samples: pipeline.samples,
                algorithm: pipeline.algorithm.clone(),
                parameter: pipeline.parameter,
            },
            icra_timeout_secs: PipeConfig::parse_seconds(&pipeline.icra_timeout)
                .context("Invalid icra_timeout")?,
            deps: pipeline.deps,
            stage_timeout,
            memory_limit: pipeline
                .memory_limit_mb
                .map(|mb| mb.checked_mul(1024 * 1024).context("memory_limit_mb is too large"))
                .transpose()?,
        })
    }
}

/// Runs pipelines over input files through a [`CommandRunner`]
pub struct Pipeline<'a> {
    runner: &'a dyn CommandRunner,
    paths: ToolPaths,
    settings: StageSettings,
    dry: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(runner: &'a dyn CommandRunner, paths: ToolPaths, settings: StageSettings, dry: bool) -> Self {
        Self {
            runner,
            paths,
            settings,
            dry,
        }
    }

    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    /// Same tools and runner with different stage settings
    pub fn with_settings(&self, settings: StageSettings) -> Pipeline<'a> {
        Pipeline {
            runner: self.runner,
            paths: self.paths.clone(),
            settings,
            dry: self.dry,
        }
    }

    fn run(&self, argv: Vec<String>, cwd: &Path) -> anyhow::Result<RunOutput> {
        let spec = CommandSpec::new(argv, cwd).timeout(self.settings.stage_timeout);
        self.execute(spec)
    }

    fn execute(&self, spec: CommandSpec) -> anyhow::Result<RunOutput> {
        self.runner
            .run(&spec)
            .with_context(|| format!("Failed to run `{}`", spec.display()))
    }

    /// Run `spec` and fail unless it exits with status 0
    fn execute_checked(&self, spec: CommandSpec) -> anyhow::Result<RunOutput> {
        let output = self.execute(spec.clone())?;
        match output.exit_code {
            Some(0) if !output.timed_out => Ok(output),
            Some(code) if !output.timed_out => {
                bail!("`{}` exited with {}: {}", spec.display(), code, output.output)
            }
            _ => bail!("`{}` did not exit normally", spec.display()),
        }
    }

    /// Check out and build the requested brbo2 revision. `master` resolves to
    /// the commit currently checked out. Returns the commit that was built, or
    /// `None` on a dry run, which only logs the commands.
    pub fn pin_version(&self, version: &str) -> anyhow::Result<Option<String>> {
        if self.dry {
            tracing::info!("Build brbo2 at `{}`", version);
            let mut commands = vec![git_checkout_command(version), build_command()];
            if version == "master" {
                commands.insert(0, git_head_command());
            }
            for argv in commands {
                tracing::info!("Skip `{}`", argv.join(" "));
            }
            return Ok(None);
        }

        let commit = if version == "master" {
            let head = self.execute_checked(CommandSpec::new(git_head_command(), &self.paths.brbo2).quiet())?;
            let commit = head.output.trim().trim_matches('"').to_string();
            if commit.is_empty() {
                bail!("git log printed no commit in {}", self.paths.brbo2.display());
            }
            commit
        } else {
            version.to_string()
        };

        self.execute_checked(CommandSpec::new(git_checkout_command(&commit), &self.paths.brbo2).quiet())?;
        tracing::info!("Build a new version of brbo2: {}", commit);
        self.execute_checked(CommandSpec::new(build_command(), &self.paths.brbo2))?;
        Ok(Some(commit))
    }

    /// Fuzz, decompose and verify every file
    pub fn run_brbo2(&self, files: &[PathBuf], fuzzer: FuzzerMode) -> anyhow::Result<TimeMeasurement> {
        let mut measurement = TimeMeasurement::new();
        let pb = progress_bar(files.len());

        for java_file in files {
            pb.set_message(file_label(java_file));
            tracing::info!("Process file `{}`", java_file.display());

            let fuzz = self.run(
                fuzz_command(
                    self.settings.fuzz_timeout_secs,
                    java_file,
                    &self.paths.qfuzz,
                    self.settings.deps,
                    fuzzer,
                ),
                &self.paths.brbo2,
            )?;

            let decomposition = decomposed_file(java_file, &self.paths.brbo2);
            remove_stale(&decomposition, self.dry)
                .with_context(|| format!("Failed to remove {}", decomposition.display()))?;

            let decompose = self.run(
                decompose_command(&self.settings.decompose, java_file, self.settings.deps),
                &self.paths.brbo2,
            )?;
            measurement.record_metrics(java_file, &decompose.output);

            let verify = self.verify(&decomposition, AmortizationMode::Selective)?;

            let verdict = measurement.update(
                java_file,
                &verify,
                StageTimes::new(fuzz.elapsed_secs(), decompose.elapsed_secs(), verify.elapsed_secs()),
            );
            tracing::debug!("{}: {}", java_file.display(), verdict);
            pb.inc(1);
        }

        pb.finish_with_message("Complete");
        measurement.print();
        Ok(measurement)
    }

    /// Translate and verify every file without a decomposition
    pub fn run_brbo(&self, files: &[PathBuf], mode: AmortizationMode) -> anyhow::Result<TimeMeasurement> {
        if mode == AmortizationMode::Selective {
            bail!("The brbo pipeline runs with worst-case or full amortization only");
        }
        let mut measurement = TimeMeasurement::new();
        let pb = progress_bar(files.len());

        for java_file in files {
            pb.set_message(file_label(java_file));
            tracing::info!("Process file `{}`", java_file.display());

            let decomposition = decomposed_file(java_file, &self.paths.brbo2);
            remove_stale(&decomposition, self.dry)
                .with_context(|| format!("Failed to remove {}", decomposition.display()))?;

            // Translate into a brbo-compatible form
            self.run(
                translate_command(java_file, self.settings.deps),
                &self.paths.brbo2,
            )?;

            let verify = self.verify(&decomposition, mode)?;
            measurement.update(
                java_file,
                &verify,
                StageTimes::verification_only(verify.elapsed_secs()),
            );
            pb.inc(1);
        }

        pb.finish_with_message("Complete");
        measurement.print();
        Ok(measurement)
    }

    fn verify(&self, file: &Path, mode: AmortizationMode) -> anyhow::Result<RunOutput> {
        let spec = CommandSpec::new(
            verify_command(
                file,
                &self.paths.icra,
                self.settings.deps,
                self.settings.icra_timeout_secs,
                mode,
            ),
            &self.paths.brbo,
        )
        .timeout(self.settings.stage_timeout)
        .memory_limit(self.settings.memory_limit);
        self.execute(spec)
    }

    /// Metadata for a run log produced by this pipeline
    pub fn run_meta(&self, pipeline: &str, configuration: &str, git_commit: Option<String>) -> RunMeta {
        RunMeta {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            pipeline: pipeline.to_string(),
            configuration: configuration.to_string(),
            git_commit,
            dry: self.dry,
        }
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

fn file_label(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
