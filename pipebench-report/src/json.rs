//! JSON Output

use crate::report::RunLog;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing run logs
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed run log {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Generate prettified JSON for any report value
pub fn generate_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Read a run log written by [`write_run_log`]
pub fn read_run_log(path: &Path) -> Result<RunLog, LogError> {
    let content = std::fs::read_to_string(path).map_err(|source| LogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a run log, creating parent directories as needed
pub fn write_run_log(path: &Path, log: &RunLog) -> Result<(), LogError> {
    let json = generate_json(log)?;
    let io_error = |source| LogError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, json).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{StageTimes, Verdict};

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/selective/run-0.json");

        let mut log = RunLog::default();
        log.time_measurements
            .insert("A.java".to_string(), StageTimes::new(1.0, 2.0, 3.0));
        log.verification_results
            .insert("A.java".to_string(), Verdict::Verified);
        log.total_time = 6.0;

        write_run_log(&path, &log).unwrap();
        let read = read_run_log(&path).unwrap();
        assert_eq!(read.verification_results["A.java"], Verdict::Verified);
        assert_eq!(read.total_time, 6.0);
    }

    #[test]
    fn test_malformed_log_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_run_log(&path).unwrap_err();
        assert!(matches!(err, LogError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
