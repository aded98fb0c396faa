//! CSV Output

use crate::table::{ComparisonTable, ExperimentTable, TimeInterval};
use std::collections::BTreeMap;

/// Generate CSV for one experiment table
pub fn generate_table_csv(table: &ExperimentTable) -> String {
    let mut output = String::from(
        "file,runs,fuzz_lower,fuzz_upper,decompose_lower,decompose_upper,verify_lower,verify_upper,verified_ratio\n",
    );

    for row in &table.rows {
        let fields = [
            escape(&row.file),
            row.runs.to_string(),
            interval_fields(row.fuzz_time),
            interval_fields(row.decompose_time),
            interval_fields(row.verification_time),
            ratio_field(row.verified_ratio),
        ];
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    output
}

/// Generate CSV for a comparison: per configuration, the verified ratio and
/// the verification-time interval.
pub fn generate_comparison_csv(table: &ComparisonTable) -> String {
    let mut header = vec!["file".to_string()];
    for configuration in &table.configurations {
        let name = escape(configuration);
        header.push(format!("{name}_verified"));
        header.push(format!("{name}_verify_lower"));
        header.push(format!("{name}_verify_upper"));
    }

    let mut output = header.join(",");
    output.push('\n');

    for row in &table.rows {
        let mut fields = vec![escape(&row.file)];
        for cell in &row.cells {
            match cell {
                Some(cell) => {
                    fields.push(ratio_field(cell.verified_ratio));
                    fields.push(interval_fields(cell.verification_time));
                }
                None => fields.push(",,".to_string()),
            }
        }
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    output
}

/// Generate two-column CSV from named counts
pub fn generate_counts_csv(header: (&str, &str), counts: &BTreeMap<String, usize>) -> String {
    let mut output = format!("{},{}\n", escape(header.0), escape(header.1));
    for (name, count) in counts {
        output.push_str(&format!("{},{}\n", escape(name), count));
    }
    output
}

fn interval_fields(interval: Option<TimeInterval>) -> String {
    match interval {
        Some(TimeInterval { lower, upper }) => format!("{:.3},{:.3}", lower, upper),
        None => ",".to_string(),
    }
}

fn ratio_field(ratio: Option<f64>) -> String {
    ratio.map(|r| format!("{:.3}", r)).unwrap_or_default()
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
