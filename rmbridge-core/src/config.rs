//! Synchronization configuration.
//!
//! ```yaml
//! model:
//!   path: model.yaml
//! modules:
//!   - id: "25093"
//!     capella-uuid: 3be8d0fc-c693-4b9b-8fa1-d59a9eec6ea4
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{ItemId, ObjectId};

/// Root of the config YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    #[serde(default, alias = "trackers", alias = "live-docs")]
    pub modules: Vec<TrackerConfig>,
}

impl Config {
    /// Model document path; relative paths are resolved against the
    /// directory holding the config file.
    pub fn model_path(&self, config_path: &Path) -> PathBuf {
        if self.model.path.is_absolute() {
            return self.model.path.clone();
        }
        config_path
            .parent()
            .map(|dir| dir.join(&self.model.path))
            .unwrap_or_else(|| self.model.path.clone())
    }
}

/// Where the target model lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
}

/// Config section of one tracker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// UUID of the target requirements module. Missing is a fatal tracker error.
    #[serde(rename = "capella-uuid", default, skip_serializing_if = "Option::is_none")]
    pub capella_uuid: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
}

impl TrackerConfig {
    pub fn for_module(uuid: impl Into<ObjectId>) -> Self {
        Self {
            capella_uuid: Some(uuid.into()),
            id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
