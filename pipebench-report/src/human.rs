//! Human-readable Output
//!
//! Terminal tables for experiment and comparison results.

use crate::table::{ComparisonTable, ExperimentTable, TimeInterval};

/// Format one experiment table for the terminal
pub fn format_table_human(table: &ExperimentTable) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!(
        "Pipebench Results: {} ({} run logs, {:.0}% CI)\n",
        table.label,
        table.run_logs,
        table.confidence_level * 100.0
    ));
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for row in &table.rows {
        output.push_str(&format!("  {} ({} runs)\n", row.file, row.runs));
        output.push_str(&format!(
            "      fuzz: {}  decompose: {}  verify: {}\n",
            format_interval(row.fuzz_time),
            format_interval(row.decompose_time),
            format_interval(row.verification_time),
        ));
        output.push_str(&format!(
            "      verified: {}\n",
            format_ratio(row.verified_ratio)
        ));
    }

    let verified = table
        .rows
        .iter()
        .filter(|row| row.verified_ratio.is_some_and(|r| r >= 1.0))
        .count();
    output.push('\n');
    output.push_str(&format!(
        "Summary: {} files, {} verified in every run\n",
        table.rows.len(),
        verified
    ));

    output
}

/// Format a comparison across configurations for the terminal
pub fn format_comparison_human(table: &ComparisonTable) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("Pipebench Comparison\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for row in &table.rows {
        output.push_str(&format!("  {}\n", row.file));
        for (configuration, cell) in table.configurations.iter().zip(&row.cells) {
            match cell {
                Some(cell) => output.push_str(&format!(
                    "      {:<16} verified: {:<8} verify: {}\n",
                    configuration,
                    format_ratio(cell.verified_ratio),
                    format_interval(cell.verification_time),
                )),
                None => output.push_str(&format!("      {:<16} not run\n", configuration)),
            }
        }
    }

    output
}

fn format_interval(interval: Option<TimeInterval>) -> String {
    match interval {
        Some(TimeInterval { lower, upper }) if (upper - lower).abs() < 1e-9 => {
            format!("{:.2}s", lower)
        }
        Some(TimeInterval { lower, upper }) => format!("[{:.2}, {:.2}]s", lower, upper),
        None => "-".to_string(),
    }
}

fn format_ratio(ratio: Option<f64>) -> String {
    ratio
        .map(|r| format!("{:.0}%", r * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::FileRow;

    #[test]
    fn test_human_table() {
        let table = ExperimentTable {
            label: "worst".to_string(),
            confidence_level: 0.95,
            run_logs: 3,
            rows: vec![FileRow {
                file: "lang3/Lexx.java".to_string(),
                runs: 3,
                fuzz_time: None,
                decompose_time: None,
                verification_time: Some(TimeInterval {
                    lower: 4.0,
                    upper: 6.5,
                }),
                verified_ratio: Some(1.0),
            }],
        };

        let output = format_table_human(&table);
        assert!(output.contains("worst (3 run logs, 95% CI)"));
        assert!(output.contains("verify: [4.00, 6.50]s"));
        assert!(output.contains("verified: 100%"));
        assert!(output.contains("1 files, 1 verified in every run"));
    }
}
