//! Integration tests for Pipebench
//!
//! Drive the CLI end to end with a scripted runner standing in for the
//! external tools, then aggregate the run logs it wrote.

use clap::Parser;
use pipebench::{
    Cli, CommandRunner, CommandSpec, PipeConfig, ProcessRunner, RunOutput, RunnerError, Verdict,
    read_run_log, run_command,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Answers verification by amortization mode; everything else succeeds silently
#[derive(Default)]
struct FakeTools {
    commands: RefCell<Vec<Vec<String>>>,
}

impl CommandRunner for FakeTools {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, RunnerError> {
        self.commands.borrow_mut().push(spec.argv.clone());
        let amortize = spec
            .argv
            .iter()
            .position(|arg| arg == "--amortize")
            .and_then(|i| spec.argv.get(i + 1))
            .map(String::as_str);
        let output = match amortize {
            Some("transparent") => "[info] verified? Yes",
            Some("no") => "[info] verified? No",
            _ => "",
        };
        Ok(RunOutput {
            output: output.to_string(),
            elapsed: Duration::from_millis(1500),
            exit_code: Some(0),
            timed_out: false,
        })
    }
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for file in ["benchmarks/stac/TemplateEngine.java", "benchmarks/lang3/Lexx.java"] {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "class T {\n  void f() {}\n}\n").unwrap();
        }
        Self { dir }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn arg(&self, relative: &str) -> String {
        self.path(relative).display().to_string()
    }

    fn tools(&self) -> Vec<String> {
        vec![
            "--brbo2".to_string(),
            self.arg("brbo2"),
            "--brbo".to_string(),
            self.arg("brbo"),
            "--qfuzz".to_string(),
            self.arg("qfuzz"),
            "--icra".to_string(),
            self.arg("icra"),
        ]
    }
}

fn parse(args: Vec<String>) -> Cli {
    let mut argv = vec!["pipebench".to_string()];
    argv.extend(args);
    Cli::try_parse_from(argv).unwrap()
}

fn run(cli: &Cli, runner: &dyn CommandRunner) {
    run_command(cli, &PipeConfig::default(), runner).unwrap();
}

fn json_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|entry| {
            entry
                .as_ref()
                .map(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                .unwrap_or(false)
        })
        .count()
}

#[test]
fn test_verifiability_experiment_writes_one_log_per_run() {
    let ws = Workspace::new();
    let tools = FakeTools::default();
    let mut args = vec![
        "experiments".to_string(),
        "--input".to_string(),
        ws.arg("benchmarks"),
        "--experiment".to_string(),
        "verifiability".to_string(),
        "--repeat".to_string(),
        "2".to_string(),
        "--log-dir".to_string(),
        ws.arg("logs"),
    ];
    args.extend(ws.tools());

    run(&parse(args), &tools);

    for configuration in ["selective", "worst", "fully"] {
        assert_eq!(json_files(&ws.path(&format!("logs/verifiability/{configuration}"))), 2);
    }

    let selective = read_run_log(&ws.path("logs/verifiability/selective/run-1.json")).unwrap();
    let meta = selective.meta.as_ref().unwrap();
    assert_eq!(meta.pipeline, "brbo2");
    assert_eq!(meta.configuration, "selective");
    assert!(!meta.dry);
    assert_eq!(selective.count_verified["stac"], 1);
    assert_eq!(selective.count_verified["lang3"], 1);
    assert!((selective.total_time - 2.0 * 4.5).abs() < 1e-9);

    let worst = read_run_log(&ws.path("logs/verifiability/worst/run-2.json")).unwrap();
    assert_eq!(worst.meta.unwrap().pipeline, "brbo");
    assert!(worst.verification_results.values().all(|v| *v == Verdict::NotVerified));
    assert!((worst.total_time - 3.0).abs() < 1e-9);

    let fully = read_run_log(&ws.path("logs/verifiability/fully/run-1.json")).unwrap();
    assert_eq!(fully.count_unknown.values().sum::<u64>(), 2);

    // 2 runs × (2 files × 3 brbo2 stages + 2 files × 2 brbo stages × 2 modes)
    assert_eq!(tools.commands.borrow().len(), 2 * (6 + 8));

    // brbo2 fuzzes for a minute in this experiment
    let commands = tools.commands.borrow();
    let fuzz = commands.iter().find(|argv| argv[1] == "fuzz").unwrap();
    assert_eq!(fuzz[2..4], ["--timeout".to_string(), "60".to_string()]);
}

#[test]
fn test_data_and_compare_aggregate_logs() {
    let ws = Workspace::new();
    let tools = FakeTools::default();
    let mut args = vec![
        "experiments".to_string(),
        "--input".to_string(),
        ws.arg("benchmarks/stac"),
        "--experiment".to_string(),
        "verifiability".to_string(),
        "--repeat".to_string(),
        "3".to_string(),
        "--log-dir".to_string(),
        ws.arg("logs"),
    ];
    args.extend(ws.tools());
    run(&parse(args), &tools);

    run(
        &parse(vec![
            "data".to_string(),
            "--input".to_string(),
            ws.arg("logs/verifiability/selective"),
            "--output".to_string(),
            ws.arg("tables/selective.csv"),
        ]),
        &tools,
    );
    let csv = std::fs::read_to_string(ws.path("tables/selective.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("file,runs,"));
    // Identical samples collapse to a degenerate interval
    assert!(lines[1].ends_with(",3,1.500,1.500,1.500,1.500,1.500,1.500,1.000"));
    assert!(lines[1].contains("TemplateEngine.java"));

    run(
        &parse(vec![
            "compare".to_string(),
            format!("selective={}", ws.arg("logs/verifiability/selective")),
            ws.arg("logs/verifiability/worst"),
            "--format".to_string(),
            "json".to_string(),
            "--output".to_string(),
            ws.arg("tables/compare.json"),
        ]),
        &tools,
    );
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(ws.path("tables/compare.json")).unwrap())
            .unwrap();
    assert_eq!(json["configurations"], serde_json::json!(["selective", "worst"]));
    assert_eq!(json["rows"][0]["cells"][0]["verified_ratio"], 1.0);
    assert_eq!(json["rows"][0]["cells"][1]["verified_ratio"], 0.0);
}

#[test]
fn test_data_fails_on_percent_confidence_level() {
    let ws = Workspace::new();
    let tools = FakeTools::default();
    let mut args = vec![
        "experiments".to_string(),
        "--input".to_string(),
        ws.arg("benchmarks/stac"),
        "--experiment".to_string(),
        "verifiability".to_string(),
        "--repeat".to_string(),
        "3".to_string(),
        "--log-dir".to_string(),
        ws.arg("logs"),
    ];
    args.extend(ws.tools());
    run(&parse(args), &tools);

    let mut config = PipeConfig::default();
    config.stats.confidence_level = 95.0;
    let data = parse(vec![
        "data".to_string(),
        "--input".to_string(),
        ws.arg("logs/verifiability/selective"),
        "--output".to_string(),
        ws.arg("tables/selective.csv"),
    ]);
    let err = run_command(&data, &config, &tools).unwrap_err();
    assert!(format!("{:#}", err).contains("Invalid confidence level: 95"));
    assert!(!ws.path("tables/selective.csv").exists());

    let compare = parse(vec![
        "compare".to_string(),
        ws.arg("logs/verifiability/selective"),
        ws.arg("logs/verifiability/worst"),
    ]);
    assert!(run_command(&compare, &config, &tools).is_err());
}

#[test]
fn test_dry_run_records_unknown_verdicts() {
    let ws = Workspace::new();
    let runner = ProcessRunner::new(true, Duration::from_millis(500));
    let mut args = vec![
        "brbo2".to_string(),
        "--input".to_string(),
        ws.arg("benchmarks"),
        "--log".to_string(),
        ws.arg("brbo2.json"),
        "--revision".to_string(),
        "master".to_string(),
        "--dry".to_string(),
    ];
    args.extend(ws.tools());

    run(&parse(args), &runner);

    let log = read_run_log(&ws.path("brbo2.json")).unwrap();
    let meta = log.meta.unwrap();
    assert!(meta.dry);
    assert_eq!(meta.git_commit, None);
    assert_eq!(log.verification_results.len(), 2);
    assert!(log.verification_results.values().all(|v| *v == Verdict::Unknown));
    assert_eq!(log.total_time, 0.0);
    assert!(!ws.path("brbo2/output").exists());
}
