//! Input discovery and the on-disk layout of brbo2 outputs

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("{0} is neither a file nor a directory")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Collect input files under `path`.
///
/// A file is returned as-is. A directory is walked recursively for files
/// whose name starts with `prefix` and whose extension is `suffix`. Paths are
/// absolute and sorted.
pub fn get_files(path: &Path, prefix: &str, suffix: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let root = absolute(path)?;
    let mut files = Vec::new();
    if root.is_file() {
        files.push(root);
    } else if root.is_dir() {
        walk(&root, prefix, suffix, &mut files)?;
    } else {
        return Err(DiscoveryError::NotFound(path.to_path_buf()));
    }
    files.sort();
    Ok(files)
}

/// All `.java` files under `path`
pub fn get_java_files(path: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    get_files(path, "", "java")
}

fn walk(dir: &Path, prefix: &str, suffix: &str, files: &mut Vec<PathBuf>) -> Result<(), DiscoveryError> {
    let io_error = |source| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            walk(&path, prefix, suffix, files)?;
        } else if matches(&path, prefix, suffix) {
            files.push(path);
        }
    }
    Ok(())
}

fn matches(path: &Path, prefix: &str, suffix: &str) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(prefix));
    let extension_matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == suffix);
    name_matches && extension_matches
}

fn absolute(path: &Path) -> Result<PathBuf, DiscoveryError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(path))
}

/// Name of the directory directly containing `file`
pub fn inner_most_package_name(file: &Path) -> String {
    file.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Where brbo2 writes the decomposition of `java_file`
pub fn decomposed_file(java_file: &Path, brbo2_root: &Path) -> PathBuf {
    let mut path = brbo2_root
        .join("output")
        .join("decomposed")
        .join(inner_most_package_name(java_file));
    if let Some(name) = java_file.file_name() {
        path.push(name);
    }
    path
}

/// Delete a stale decomposition. A missing file is not an error.
pub fn remove_stale(path: &Path, dry: bool) -> std::io::Result<()> {
    tracing::info!("Remove the existing decomposition `{}`", path.display());
    if dry {
        return Ok(());
    }
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No decomposition at `{}`", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}
