//! Shared value types.
//!
//! Identifiers of the external requirements tool are normalised to strings,
//! model objects are addressed by [`ObjectId`], and every reference threaded
//! through a change set is a [`Ref`]: either an existing object or a promise
//! that the applier resolves once the promised object has been created.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque stable id (UUID string) of an object in the target model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of a module or work item in the requirements tool.
///
/// Snapshots carry these as integers or strings; both deserialize to the
/// same string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Integer(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Integer(i) => Self(i.to_string()),
            Raw::Text(s) => Self(s),
        })
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// Address of an object inside a change set.
///
/// Serialized as YAML tags: `!uuid <id>` and `!promise <token>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ref {
    #[serde(rename = "uuid")]
    Existing(ObjectId),
    #[serde(rename = "promise")]
    Promised(String),
}

impl Ref {
    pub fn existing(id: &ObjectId) -> Self {
        Self::Existing(id.clone())
    }

    pub fn promise(token: impl Into<String>) -> Self {
        Self::Promised(token.into())
    }

    pub fn as_existing(&self) -> Option<&ObjectId> {
        match self {
            Ref::Existing(id) => Some(id),
            Ref::Promised(_) => None,
        }
    }

    pub fn is_promise(&self) -> bool {
        matches!(self, Ref::Promised(_))
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Existing(id) => write!(f, "!uuid {id}"),
            Ref::Promised(token) => write!(f, "!promise {token}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether a work item is a folder (has a `children` key) or a leaf requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Folder,
    Requirement,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Folder => write!(f, "Folder"),
            ItemKind::Requirement => write!(f, "Requirement"),
        }
    }
}

/// Declared kind of an attribute definition.
///
/// Unknown kinds are kept verbatim in [`FieldKind::Other`]; their values are
/// not shape-checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    Boolean,
    Date,
    Enum,
    Float,
    Integer,
    String,
    Other(String),
}

impl FieldKind {
    pub fn name(&self) -> &str {
        match self {
            FieldKind::Boolean => "Boolean",
            FieldKind::Date => "Date",
            FieldKind::Enum => "Enum",
            FieldKind::Float => "Float",
            FieldKind::Integer => "Integer",
            FieldKind::String => "String",
            FieldKind::Other(name) => name,
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, FieldKind::Enum)
    }
}

impl From<String> for FieldKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Boolean" => FieldKind::Boolean,
            "Date" | "Datetime" => FieldKind::Date,
            "Enum" => FieldKind::Enum,
            "Float" => FieldKind::Float,
            "Integer" => FieldKind::Integer,
            "String" => FieldKind::String,
            _ => FieldKind::Other(s),
        }
    }
}

impl From<&str> for FieldKind {
    fn from(s: &str) -> Self {
        FieldKind::from(s.to_owned())
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.name().to_owned()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A raw attribute value as found in a snapshot or stored on a model attribute.
///
/// Dates travel as RFC 3339 / ISO 8601 text. Shapes that match none of the
/// primitive variants land in [`FieldValue::Other`] so that a corrupt value
/// fails validation instead of failing the whole snapshot parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
    Other(serde_yaml::Value),
}

impl FieldValue {
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(values: Vec<&str>) -> Self {
        FieldValue::List(values.into_iter().map(str::to_owned).collect())
    }
}

/// Renders values the way they appear in user-facing error messages:
/// `'text'`, `['a', 'b']`, `None`.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "None"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => write!(f, "'{s}'"),
            FieldValue::List(values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
                write!(f, "[{}]", quoted.join(", "))
            }
            FieldValue::Other(value) => {
                let rendered = serde_yaml::to_string(value).unwrap_or_default();
                write!(f, "{}", rendered.trim_end())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
