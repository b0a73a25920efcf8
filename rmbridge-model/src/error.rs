//! Error types for rmbridge-model.

use std::path::PathBuf;

use rmbridge_core::{Collection, Field, ObjectId};
use thiserror::Error;

/// Errors from building, loading or saving a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("model not found at {path}")]
    NotFound { path: PathBuf },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("duplicate object uuid {0}")]
    DuplicateUuid(ObjectId),

    /// A moved object would end up below itself.
    #[error("cannot move {0} below its own descendant")]
    Cycle(ObjectId),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ModelError {
    ModelError::Io {
        path: path.into(),
        source,
    }
}

/// Errors raised while applying a change set to a model.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("unresolved promise '{0}'")]
    UnresolvedPromise(String),

    #[error("cannot extend {collection} of {target}: {reason}")]
    InvalidExtension {
        collection: Collection,
        target: ObjectId,
        reason: String,
    },

    #[error("cannot modify {field:?} of {target}: {reason}")]
    InvalidModification {
        field: Field,
        target: ObjectId,
        reason: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}
