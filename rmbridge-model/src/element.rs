//! Objects of the target requirements model.

use std::fmt;

use rmbridge_core::{FieldKind, FieldValue, ObjectId};
use serde::{Deserialize, Serialize};

/// Kind-specific payload of an [`Element`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementData {
    Module,
    TypesFolder,
    DataTypeDefinition,
    EnumValue,
    RequirementType,
    AttributeDefinition,
    AttributeDefinitionEnumeration {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_type: Option<ObjectId>,
        #[serde(default)]
        multi_valued: bool,
    },
    Folder {
        #[serde(rename = "requirement_type", default, skip_serializing_if = "Option::is_none")]
        type_ref: Option<ObjectId>,
    },
    Requirement {
        #[serde(rename = "requirement_type", default, skip_serializing_if = "Option::is_none")]
        type_ref: Option<ObjectId>,
    },
    AttributeValue {
        kind: FieldKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        definition: Option<ObjectId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<FieldValue>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<ObjectId>,
    },
}

impl ElementData {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementData::Module => ElementKind::Module,
            ElementData::TypesFolder => ElementKind::TypesFolder,
            ElementData::DataTypeDefinition => ElementKind::DataTypeDefinition,
            ElementData::EnumValue => ElementKind::EnumValue,
            ElementData::RequirementType => ElementKind::RequirementType,
            ElementData::AttributeDefinition => ElementKind::AttributeDefinition,
            ElementData::AttributeDefinitionEnumeration { .. } => {
                ElementKind::AttributeDefinitionEnumeration
            }
            ElementData::Folder { .. } => ElementKind::Folder,
            ElementData::Requirement { .. } => ElementKind::Requirement,
            ElementData::AttributeValue { .. } => ElementKind::AttributeValue,
        }
    }

    pub fn folder() -> Self {
        ElementData::Folder { type_ref: None }
    }

    pub fn requirement() -> Self {
        ElementData::Requirement { type_ref: None }
    }
}

/// Fieldless mirror of [`ElementData`] used for lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Module,
    TypesFolder,
    DataTypeDefinition,
    EnumValue,
    RequirementType,
    AttributeDefinition,
    AttributeDefinitionEnumeration,
    Folder,
    Requirement,
    AttributeValue,
}

impl ElementKind {
    /// Both attribute definition classes.
    pub const ATTRIBUTE_DEFINITIONS: [ElementKind; 2] = [
        ElementKind::AttributeDefinition,
        ElementKind::AttributeDefinitionEnumeration,
    ];

    /// Folders and requirements.
    pub const WORK_ITEMS: [ElementKind; 2] = [ElementKind::Folder, ElementKind::Requirement];
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One object of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub uuid: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ObjectId>,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub long_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub data: ElementData,
    /// Ordered child uuids; rebuilt from `parent` links on load.
    #[serde(skip)]
    pub(crate) children: Vec<ObjectId>,
}

impl Element {
    /// A detached element with a fresh random uuid.
    pub fn new(data: ElementData) -> Self {
        Self::with_uuid(uuid::Uuid::new_v4().to_string(), data)
    }

    pub fn with_uuid(uuid: impl Into<ObjectId>, data: ElementData) -> Self {
        Self {
            uuid: uuid.into(),
            parent: None,
            identifier: String::new(),
            long_name: String::new(),
            text: None,
            data,
            children: Vec::new(),
        }
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = long_name.into();
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn kind(&self) -> ElementKind {
        self.data.kind()
    }

    pub fn child_ids(&self) -> &[ObjectId] {
        &self.children
    }

    /// Requirement type of a folder or requirement.
    pub fn type_ref(&self) -> Option<&ObjectId> {
        match &self.data {
            ElementData::Folder { type_ref } | ElementData::Requirement { type_ref } => {
                type_ref.as_ref()
            }
            _ => None,
        }
    }

    /// Definition of an attribute value.
    pub fn definition(&self) -> Option<&ObjectId> {
        match &self.data {
            ElementData::AttributeValue { definition, .. } => definition.as_ref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
