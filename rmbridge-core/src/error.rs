//! Error types for rmbridge-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading config or snapshot documents.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document did not exist at the expected path.
    #[error("file not found at {path}")]
    NotFound { path: PathBuf },
}
