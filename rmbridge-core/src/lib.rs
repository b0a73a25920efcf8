//! RM-Bridge core library: snapshot schema, config, action vocabulary, errors.
//!
//! Public API surface:
//! - [`types`]: identifiers, references/promises and primitive field values
//! - [`snapshot`]: the requirements-tool snapshot document
//! - [`config`]: per-tracker configuration
//! - [`action`]: the declarative change document produced by the compiler
//! - [`load`]: YAML loading of config and snapshot files
//! - [`error`]: [`LoadError`]

pub mod action;
pub mod config;
pub mod error;
pub mod load;
pub mod snapshot;
pub mod types;

pub use action::{
    Action, AttributeDefinitionKind, ChildEntry, Collection, Extension, Field, FieldChange,
    NewAttributeDefinition, NewAttributeValue, NewDataType, NewElement, NewEnumValue,
    NewRequirementType, NewTypesFolder, NewWorkItem,
};
pub use config::{Config, ModelConfig, TrackerConfig};
pub use error::LoadError;
pub use snapshot::{
    AttributeDefinitionSpec, MetaData, RequirementTypeSpec, Snapshot, TrackerSnapshot, WorkItem,
};
pub use types::{FieldKind, FieldValue, ItemId, ItemKind, ObjectId, Ref};
