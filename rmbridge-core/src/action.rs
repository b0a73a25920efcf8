//! The change-set vocabulary.
//!
//! An [`Action`] addresses one object (by UUID or promise) and carries up to
//! three operation groups: `extend` (nested create descriptors or references
//! of objects to move under the addressed one), `modify` (flat field
//! assignments) and `delete` (references to remove from a collection).
//! Serialized to YAML this is the declarative document the applier consumes.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::types::{FieldKind, FieldValue, Ref};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// A named child collection of a model object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    RequirementTypesFolders,
    DataTypeDefinitions,
    Values,
    RequirementTypes,
    AttributeDefinitions,
    Folders,
    Requirements,
    Attributes,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collection::RequirementTypesFolders => "requirement_types_folders",
            Collection::DataTypeDefinitions => "data_type_definitions",
            Collection::Values => "values",
            Collection::RequirementTypes => "requirement_types",
            Collection::AttributeDefinitions => "attribute_definitions",
            Collection::Folders => "folders",
            Collection::Requirements => "requirements",
            Collection::Attributes => "attributes",
        };
        f.write_str(name)
    }
}

/// A scalar field that a `modify` group can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Identifier,
    LongName,
    Text,
    #[serde(rename = "type")]
    Type,
    Value,
    Values,
    DataType,
    MultiValued,
}

/// New value of a modified field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldChange {
    Value(FieldValue),
    Ref(Ref),
    Refs(Vec<Ref>),
    /// Clears a reference field (serialized as `null`).
    Unset,
}

impl FieldChange {
    pub fn text(s: impl Into<String>) -> Self {
        FieldChange::Value(FieldValue::Text(s.into()))
    }

    pub fn flag(b: bool) -> Self {
        FieldChange::Value(FieldValue::Boolean(b))
    }
}

// ---------------------------------------------------------------------------
// Create descriptors
// ---------------------------------------------------------------------------

/// An `extend` entry: a new object, or an existing one to move here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Extension {
    Create(NewElement),
    Reference(Ref),
}

impl Extension {
    pub fn as_new(&self) -> Option<&NewElement> {
        match self {
            Extension::Create(new) => Some(new),
            Extension::Reference(_) => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Ref> {
        match self {
            Extension::Reference(r) => Some(r),
            Extension::Create(_) => None,
        }
    }
}

/// Create descriptor for any object kind the compiler creates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NewElement {
    TypesFolder(NewTypesFolder),
    DataType(NewDataType),
    EnumValue(NewEnumValue),
    RequirementType(NewRequirementType),
    AttributeDefinition(NewAttributeDefinition),
    WorkItem(NewWorkItem),
    AttributeValue(NewAttributeValue),
}

impl NewElement {
    pub fn as_work_item(&self) -> Option<&NewWorkItem> {
        match self {
            NewElement::WorkItem(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_types_folder(&self) -> Option<&NewTypesFolder> {
        match self {
            NewElement::TypesFolder(folder) => Some(folder),
            _ => None,
        }
    }

    pub fn as_data_type(&self) -> Option<&NewDataType> {
        match self {
            NewElement::DataType(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_requirement_type(&self) -> Option<&NewRequirementType> {
        match self {
            NewElement::RequirementType(rt) => Some(rt),
            _ => None,
        }
    }

    pub fn as_attribute_definition(&self) -> Option<&NewAttributeDefinition> {
        match self {
            NewElement::AttributeDefinition(def) => Some(def),
            _ => None,
        }
    }

    pub fn as_attribute_value(&self) -> Option<&NewAttributeValue> {
        match self {
            NewElement::AttributeValue(value) => Some(value),
            _ => None,
        }
    }
}

/// The folder holding data type definitions and requirement types.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTypesFolder {
    pub long_name: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_type_definitions: Vec<NewDataType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirement_types: Vec<NewRequirementType>,
}

/// An enumeration data type with its options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDataType {
    pub identifier: String,
    pub long_name: String,
    pub promise_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<NewEnumValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEnumValue {
    pub long_name: String,
    pub promise_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRequirementType {
    pub identifier: String,
    pub long_name: String,
    pub promise_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attribute_definitions: Vec<NewAttributeDefinition>,
}

/// Plain vs. enumeration attribute definitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type")]
pub enum AttributeDefinitionKind {
    AttributeDefinition,
    AttributeDefinitionEnumeration { data_type: Ref, multi_valued: bool },
}

impl AttributeDefinitionKind {
    /// Class name, used as the first component of promise keys.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeDefinitionKind::AttributeDefinition => "AttributeDefinition",
            AttributeDefinitionKind::AttributeDefinitionEnumeration { .. } => {
                "AttributeDefinitionEnumeration"
            }
        }
    }

    /// The class name a field of the given kind is defined by.
    pub fn type_name_for(kind: &FieldKind) -> &'static str {
        if kind.is_enum() {
            "AttributeDefinitionEnumeration"
        } else {
            "AttributeDefinition"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttributeDefinition {
    pub identifier: String,
    pub long_name: String,
    pub promise_id: String,
    #[serde(flatten)]
    pub kind: AttributeDefinitionKind,
}

/// A folder or requirement.
///
/// Whether it is a folder follows from the collection it is created in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWorkItem {
    pub long_name: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<Ref>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<NewAttributeValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<ChildEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<ChildEntry>,
}

/// A child slot of a newly created folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChildEntry {
    Create(Box<NewWorkItem>),
    Existing(Ref),
}

impl ChildEntry {
    pub fn as_new(&self) -> Option<&NewWorkItem> {
        match self {
            ChildEntry::Create(item) => Some(item),
            ChildEntry::Existing(_) => None,
        }
    }
}

/// An attribute value; enumerations use `values`, everything else `value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttributeValue {
    #[serde(rename = "_type")]
    pub kind: FieldKind,
    pub definition: Ref,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Ref>,
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One entry of a change set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub parent: Ref,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extend: IndexMap<Collection, Vec<Extension>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub modify: IndexMap<Field, FieldChange>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub delete: IndexMap<Collection, Vec<Ref>>,
}

impl Action {
    pub fn new(parent: Ref) -> Self {
        Self {
            parent,
            extend: IndexMap::new(),
            modify: IndexMap::new(),
            delete: IndexMap::new(),
        }
    }

    /// True when the action carries nothing but its address.
    pub fn is_empty(&self) -> bool {
        self.extend.is_empty() && self.modify.is_empty() && self.delete.is_empty()
    }

    pub fn push_extend(&mut self, collection: Collection, entry: Extension) {
        self.extend.entry(collection).or_default().push(entry);
    }

    pub fn push_delete(&mut self, collection: Collection, target: Ref) {
        self.delete.entry(collection).or_default().push(target);
    }

    pub fn set(&mut self, field: Field, change: FieldChange) {
        self.modify.insert(field, change);
    }

    pub fn extensions(&self, collection: Collection) -> &[Extension] {
        self.extend.get(&collection).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn deletions(&self, collection: Collection) -> &[Ref] {
        self.delete.get(&collection).map(Vec::as_slice).unwrap_or_default()
    }

    /// Drops deletions rejected by `keep`, pruning collections left empty.
    pub fn retain_deletions(&mut self, mut keep: impl FnMut(Collection, &Ref) -> bool) {
        for (collection, refs) in self.delete.iter_mut() {
            refs.retain(|r| keep(*collection, r));
        }
        self.delete.retain(|_, refs| !refs.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectId;

    #[test]
    fn empty_action_has_only_an_address() {
        let action = Action::new(Ref::existing(&ObjectId::from("m")));
        assert!(action.is_empty());
        let yaml = serde_yaml::to_string(&action).expect("yaml");
        assert!(!yaml.contains("extend"));
        assert!(!yaml.contains("delete"));
    }

    #[test]
    fn retain_deletions_prunes_empty_collections() {
        let mut action = Action::new(Ref::existing(&ObjectId::from("f")));
        action.push_delete(Collection::Requirements, Ref::existing(&ObjectId::from("r1")));
        action.push_delete(Collection::Folders, Ref::existing(&ObjectId::from("f2")));

        action.retain_deletions(|c, _| c != Collection::Requirements);

        assert!(action.deletions(Collection::Requirements).is_empty());
        assert_eq!(action.deletions(Collection::Folders).len(), 1);
        assert!(!action.delete.contains_key(&Collection::Requirements));
    }

    #[test]
    fn action_yaml_uses_collection_and_field_names() {
        let mut action = Action::new(Ref::existing(&ObjectId::from("m")));
        action.set(Field::LongName, FieldChange::text("Brakes"));
        action.set(Field::Type, FieldChange::Ref(Ref::promise("RequirementType T1")));
        action.push_delete(Collection::Requirements, Ref::existing(&ObjectId::from("r2")));

        let yaml = serde_yaml::to_string(&action).expect("yaml");
        assert!(yaml.contains("long_name: Brakes"), "got: {yaml}");
        assert!(yaml.contains("!promise"), "got: {yaml}");
        assert!(yaml.contains("requirements:"), "got: {yaml}");
    }

    #[test]
    fn enumeration_definition_serializes_its_type_tag() {
        let def = NewAttributeDefinition {
            identifier: "Priority T1".into(),
            long_name: "Priority".into(),
            promise_id: "AttributeDefinitionEnumeration Priority T1".into(),
            kind: AttributeDefinitionKind::AttributeDefinitionEnumeration {
                data_type: Ref::promise("EnumerationDataTypeDefinition Priority"),
                multi_valued: false,
            },
        };
        let yaml = serde_yaml::to_string(&def).expect("yaml");
        assert!(yaml.contains("_type: AttributeDefinitionEnumeration"), "got: {yaml}");
        assert!(yaml.contains("multi_valued: false"), "got: {yaml}");
    }
}
