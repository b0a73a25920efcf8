//! YAML persistence of the model.
//!
//! ```yaml
//! elements:
//!   - uuid: 3be8d0fc-...
//!     identifier: "25093"
//!     long_name: Example module
//!     data:
//!       type: Module
//!   - uuid: 7c1e...
//!     parent: 3be8d0fc-...
//!     ...
//! ```
//!
//! Elements are written in pre-order so every parent precedes its children.
//! Saves go through a `.tmp` sibling followed by a rename.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::{io_err, ModelError};
use crate::model::Model;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModelFile {
    #[serde(default)]
    elements: Vec<Element>,
}

/// Parse a model from its YAML form.
pub fn from_yaml_str(contents: &str) -> Result<Model, serde_yaml::Error> {
    let file: ModelFile = serde_yaml::from_str(contents)?;
    // A dangling parent surfaces as a serde error so callers see one parse failure type.
    build(file).map_err(<serde_yaml::Error as serde::de::Error>::custom)
}

/// Render a model to YAML.
pub fn to_yaml_string(model: &Model) -> Result<String, serde_yaml::Error> {
    let file = ModelFile {
        elements: model.iter_preorder().into_iter().cloned().collect(),
    };
    serde_yaml::to_string(&file)
}

/// Load the model at `path`.
pub fn load_model_at(path: &Path) -> Result<Model, ModelError> {
    if !path.exists() {
        return Err(ModelError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let model = from_yaml_str(&contents).map_err(|e| ModelError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), elements = model.len(), "loaded model");
    Ok(model)
}

/// Atomically save `model` to `path`.
pub fn save_model_at(path: &Path, model: &Model) -> Result<(), ModelError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let yaml = to_yaml_string(model)?;
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    tracing::info!(path = %path.display(), "saved model");
    Ok(())
}

fn build(file: ModelFile) -> Result<Model, String> {
    let mut model = Model::new();
    for element in file.elements {
        let parent = element.parent.clone();
        let uuid = element.uuid.clone();
        model.insert(parent.as_ref(), element).map_err(|e| match e {
            ModelError::UnknownObject(p) => {
                format!("element {uuid} refers to parent {p} that does not precede it")
            }
            other => other.to_string(),
        })?;
    }
    Ok(model)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
