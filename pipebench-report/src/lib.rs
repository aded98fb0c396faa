#![warn(missing_docs)]
//! Pipebench Report - Run Logs and Tables
//!
//! Defines the per-run log schema and turns collections of run logs into
//! aggregated tables, rendered as:
//! - JSON (machine-readable)
//! - CSV (spreadsheet-compatible)
//! - Human-readable terminal output

mod csv;
mod human;
mod json;
mod report;
mod table;

pub use csv::{generate_comparison_csv, generate_counts_csv, generate_table_csv};
pub use human::{format_comparison_human, format_table_human};
pub use json::{LogError, generate_json, read_run_log, write_run_log};
pub use report::{RunLog, RunMeta, SecondaryMetrics, StageTimes, Verdict};
pub use table::{
    ComparisonCell, ComparisonRow, ComparisonTable, Data, ExperimentTable, FileRow, TimeInterval,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// CSV for spreadsheets
    Csv,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
