//! Error types for rmbridge-changeset.

use std::path::PathBuf;

use rmbridge_core::ObjectId;
use thiserror::Error;

use crate::find::FindError;

/// Conditions that abort the change-set calculation of one tracker.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    #[error("The given module configuration is missing UUID of the target RequirementsModule")]
    InvalidTrackerConfig,

    #[error("No RequirementsModule with UUID '{uuid}' found in the model")]
    MissingModule { uuid: ObjectId },

    #[error("In the snapshot the module is missing an id key")]
    InvalidSnapshotModule,

    #[error(transparent)]
    Lookup(#[from] FindError),
}

/// Errors from writing change sets and error logs.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Recoverable problems with one snapshot item, attribute or definition.
///
/// These never leave the crate: they are rendered to strings where they
/// occur and collected (or logged) by the tracker context.
#[derive(Debug, Error)]
pub(crate) enum ItemError {
    #[error("{0}")]
    InvalidWorkItemType(String),

    #[error("{0}")]
    InvalidWorkItem(String),

    #[error("{0}")]
    InvalidFieldValue(String),

    #[error("{0}")]
    InvalidAttributeDefinition(String),

    #[error(transparent)]
    Ambiguous(#[from] FindError),
}
