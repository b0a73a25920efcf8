//! YAML loading of config and snapshot documents.
//!
//! Both loaders report a missing file as [`LoadError::NotFound`] and a
//! malformed one as [`LoadError::Parse`] carrying the path and serde_yaml's
//! line context.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::LoadError;
use crate::snapshot::Snapshot;

/// Load the synchronization config at `path`.
pub fn load_config_at(path: &Path) -> Result<Config, LoadError> {
    load_yaml_at(path)
}

/// Load a requirements-tool snapshot at `path`.
pub fn load_snapshot_at(path: &Path) -> Result<Snapshot, LoadError> {
    load_yaml_at(path)
}

/// Parse a snapshot from an in-memory YAML string.
pub fn parse_snapshot(contents: &str) -> Result<Snapshot, serde_yaml::Error> {
    serde_yaml::from_str(contents)
}

fn load_yaml_at<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
