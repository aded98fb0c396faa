//! Output Interpreter
//!
//! Turns the free-form text printed by the external tools into structured
//! results: the verifier's verdict, counts reported by the decomposition
//! stage, and the integers a fuzz driver reads from a queue file.

use pipebench_report::{SecondaryMetrics, Verdict};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

const VERIFIED_MARKER: &str = "verified? Yes";
const NOT_VERIFIED_MARKER: &str = "verified? No";

/// Classify verifier output.
///
/// The positive marker wins when both appear; anything without a marker
/// (timeouts, crashes, dry runs) is [`Verdict::Unknown`].
pub fn classify(output: &str) -> Verdict {
    if output.contains(VERIFIED_MARKER) {
        Verdict::Verified
    } else if output.contains(NOT_VERIFIED_MARKER) {
        Verdict::NotVerified
    } else {
        Verdict::Unknown
    }
}

fn clusters_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)number of clusters\s*[:=]\s*(\d+)|\b(\d+)\s+clusters\b")
            .expect("valid clusters pattern")
    })
}

fn predicates_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)number of predicates\s*[:=]\s*(\d+)|\b(\d+)\s+predicates\b")
            .expect("valid predicates pattern")
    })
}

/// Last count matched by `pattern`, reading whichever alternative matched
fn last_count(pattern: &Regex, output: &str) -> Option<u64> {
    pattern
        .captures_iter(output)
        .filter_map(|captures| {
            captures
                .get(1)
                .or_else(|| captures.get(2))
                .and_then(|m| m.as_str().parse().ok())
        })
        .last()
}

/// Scrape cluster and predicate counts from decomposition output
pub fn extract_metrics(output: &str) -> SecondaryMetrics {
    SecondaryMetrics {
        clusters: last_count(clusters_pattern(), output),
        predicates: last_count(predicates_pattern(), output),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid input range: min {min} is greater than max {max}")]
    InvalidRange { min: i32, max: i32 },
}

/// Decode a fuzzer queue file the way the fuzz drivers read it: big-endian
/// 16-bit chunks, absolute value, folded into `[min, max]`. An odd trailing
/// byte is dropped.
pub fn decode_fuzzer_input(bytes: &[u8], min: i32, max: i32) -> Result<Vec<i32>, DecodeError> {
    if min > max {
        return Err(DecodeError::InvalidRange { min, max });
    }
    let range = i64::from(max) - i64::from(min) + 1;
    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| {
            let value = i64::from(i16::from_be_bytes([chunk[0], chunk[1]])).abs();
            // Lies in [min, max], so it fits back into i32
            (value % range + i64::from(min)) as i32
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("...\nverified? Yes\n..."), Verdict::Verified);
        assert_eq!(classify("Bound check: verified? No"), Verdict::NotVerified);
        assert_eq!(classify(""), Verdict::Unknown);
        assert_eq!(classify("ICRA timed out"), Verdict::Unknown);
        // Case sensitive
        assert_eq!(classify("verified? yes"), Verdict::Unknown);
    }

    #[test]
    fn test_classify_prefers_positive_marker() {
        assert_eq!(
            classify("upper bound verified? No\nlower bound verified? Yes"),
            Verdict::Verified
        );
    }

    #[test]
    fn test_extract_metrics() {
        let output = "\
            [info] Number of clusters: 3\n\
            [info] Refining...\n\
            [info] Found 4 clusters\n\
            [info] Decision tree uses 7 predicates\n";
        let metrics = extract_metrics(output);
        assert_eq!(metrics.clusters, Some(4));
        assert_eq!(metrics.predicates, Some(7));

        let only_predicates = extract_metrics("number of predicates = 2");
        assert_eq!(only_predicates.clusters, None);
        assert_eq!(only_predicates.predicates, Some(2));

        assert!(extract_metrics("verified? Yes").is_empty());
    }

    #[test]
    fn test_decode_fuzzer_input() {
        // 0x0001 = 1, 0xFFFE = -2, 0x0040 = 64, trailing 0x07 dropped
        let bytes = [0x00, 0x01, 0xFF, 0xFE, 0x00, 0x40, 0x07];
        assert_eq!(decode_fuzzer_input(&bytes, 1, 30).unwrap(), vec![2, 3, 5]);
        assert_eq!(decode_fuzzer_input(&bytes, 0, 0).unwrap(), vec![0, 0, 0]);
        assert!(decode_fuzzer_input(&[], 1, 30).unwrap().is_empty());
    }

    #[test]
    fn test_decode_handles_extremes() {
        // i16::MIN has no positive counterpart in 16 bits
        let values = decode_fuzzer_input(&[0x80, 0x00], 0, i32::MAX).unwrap();
        assert_eq!(values, vec![32768]);
        assert_eq!(
            decode_fuzzer_input(&[0x00, 0x01], 5, 1),
            Err(DecodeError::InvalidRange { min: 5, max: 1 })
        );
    }
}
