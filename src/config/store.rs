// src/config/store.rs

//! Loading and persisting YAML configuration fragments
//!
//! A configuration directory may hold several `.yaml`/`.yml` fragments. They
//! are merged at the top level with the last fragment winning. Write-back
//! collapses a directory into a single `config.yaml`.

use crate::error::{Error, Result};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name used when writing a reconciled configuration back
pub const CANONICAL_FRAGMENT: &str = "config.yaml";

/// Reads and writes configuration fragments
#[derive(Debug, Clone)]
pub struct ConfigStore {
    /// Source directories in priority order; the first is primary
    directories: Vec<PathBuf>,
}

impl ConfigStore {
    /// Create a store over the given directories
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories }
    }

    /// Source directories in the order they are merged
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Human-readable list of the source directories for error messages
    pub fn describe(&self) -> String {
        let dirs: Vec<String> = self
            .directories
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        format!("[{}]", dirs.join(", "))
    }

    /// Read and merge every fragment in every directory
    pub fn load(&self) -> Result<Value> {
        let mut merged = Value::Null;

        for dir in &self.directories {
            for path in fragment_files(dir)? {
                let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
                let fragment: Value =
                    serde_yaml::from_str(&content).map_err(|e| Error::InvalidConfiguration {
                        dirs: self.describe(),
                        reason: format!("{}: {}", path.display(), e),
                    })?;
                debug!("Loaded configuration fragment {}", path.display());
                merge_fragment(&mut merged, fragment);
            }
        }

        Ok(merged)
    }

    /// Delete every fragment in `directory`, then write `mapping` as the only
    /// fragment
    ///
    /// Not atomic: a crash between the delete and the write leaves the
    /// directory without configuration.
    pub fn replace(&self, directory: &Path, mapping: &Value) -> Result<PathBuf> {
        self.clear(directory)?;

        let rendered = serde_yaml::to_string(mapping).map_err(|e| Error::InvalidConfiguration {
            dirs: directory.display().to_string(),
            reason: e.to_string(),
        })?;

        let path = directory.join(CANONICAL_FRAGMENT);
        fs::write(&path, rendered).map_err(|e| Error::io(&path, e))?;
        info!("Wrote configuration to {}", path.display());
        Ok(path)
    }

    /// Delete every fragment in `directory`
    pub fn clear(&self, directory: &Path) -> Result<usize> {
        let files = fragment_files(directory)?;
        for path in &files {
            fs::remove_file(path).map_err(|e| Error::io(path, e))?;
            debug!("Removed configuration fragment {}", path.display());
        }
        Ok(files.len())
    }
}

/// Fragment files in a directory, sorted by name; a missing directory has none
fn fragment_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && is_fragment(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_fragment(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Top-level merge, later fragments win
fn merge_fragment(merged: &mut Value, fragment: Value) {
    match (merged, fragment) {
        (_, Value::Null) => {}
        (Value::Mapping(base), Value::Mapping(next)) => base.extend(next),
        (slot, next) => *slot = next,
    }
}
