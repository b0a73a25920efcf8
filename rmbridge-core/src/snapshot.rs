//! Snapshot document exported from the requirements-management tool.
//!
//! A [`Snapshot`] carries one [`TrackerSnapshot`] per tracker (module). Each
//! tracker declares its schema (`data_types`, `requirement_types`) next to
//! the nested work-item tree. Snapshots are read-only input, built fresh for
//! every synchronization run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{FieldKind, FieldValue, ItemId, ItemKind};

/// Root of a snapshot YAML file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetaData>,
    #[serde(default)]
    pub modules: Vec<TrackerSnapshot>,
}

/// Provenance of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub connector: String,
}

/// Desired state of one tracker / requirements module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    /// Missing ids are a fatal condition for the tracker, hence optional here.
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    /// Enum data type name → ordered option labels.
    #[serde(default, alias = "data_type_definitions")]
    pub data_types: IndexMap<String, Vec<String>>,
    /// Requirement type identifier → definition.
    #[serde(default)]
    pub requirement_types: IndexMap<String, RequirementTypeSpec>,
    #[serde(default)]
    pub items: Vec<WorkItem>,
}

/// A requirement type and its attribute definitions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequirementTypeSpec {
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeDefinitionSpec>,
}

/// Declared shape of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinitionSpec {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_values: Option<bool>,
    /// Name of the enum data type; defaults to the attribute name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl AttributeDefinitionSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            multi_values: None,
            data_type: None,
        }
    }

    /// The data type name an Enum attribute called `attribute` refers to.
    pub fn data_type_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.data_type.as_deref().unwrap_or(attribute)
    }

    pub fn multi_valued(&self) -> bool {
        self.multi_values.unwrap_or(false)
    }
}

/// One requirement or folder in the snapshot tree.
///
/// The presence of `children` (even an empty list) marks a folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<WorkItem>>,
}

impl WorkItem {
    /// A leaf requirement with only an id and a name.
    pub fn requirement(id: impl Into<String>, long_name: impl Into<String>) -> Self {
        Self {
            id: ItemId(id.into()),
            long_name: Some(long_name.into()),
            text: None,
            type_id: None,
            attributes: IndexMap::new(),
            children: None,
        }
    }

    /// A folder with the given children.
    pub fn folder(
        id: impl Into<String>,
        long_name: impl Into<String>,
        children: Vec<WorkItem>,
    ) -> Self {
        Self {
            children: Some(children),
            ..Self::requirement(id, long_name)
        }
    }

    pub fn with_type(mut self, type_id: impl Into<String>) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn kind(&self) -> ItemKind {
        if self.children.is_some() {
            ItemKind::Folder
        } else {
            ItemKind::Requirement
        }
    }

    /// Declared requirement type id; an empty string counts as undeclared.
    pub fn declared_type(&self) -> Option<&str> {
        self.type_id.as_deref().filter(|t| !t.is_empty())
    }

    pub fn children(&self) -> &[WorkItem] {
        self.children.as_deref().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
