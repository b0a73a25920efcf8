//! Change-set interpreter.
//!
//! Applies a list of [`Action`]s to a [`Model`] in three phases:
//!
//! 1. In list order: resolve each action's address, create its `extend`
//!    descriptors (registering their promise ids), move referenced objects
//!    under the addressed one and queue its `modify` assignments.
//! 2. Resolve every reference the created objects and queued assignments
//!    hold, then perform the assignments.
//! 3. Perform every `delete`. Objects that were moved away from a deleted
//!    parent in phase 1 survive.

use std::collections::HashMap;

use rmbridge_core::{
    Action, AttributeDefinitionKind, ChildEntry, Collection, Extension, Field, FieldChange,
    FieldValue, NewAttributeDefinition, NewAttributeValue, NewDataType, NewElement, NewEnumValue,
    NewRequirementType, NewTypesFolder, NewWorkItem, ObjectId, Ref,
};

use crate::element::{Element, ElementData};
use crate::error::{ApplyError, ModelError};
use crate::model::{Model, ModelQuery};

/// What an [`apply`] run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Objects created, nested ones included.
    pub created: usize,
    /// Field assignments performed.
    pub modified: usize,
    pub moved: usize,
    /// Objects removed, whole subtrees included.
    pub deleted: usize,
}

/// Apply `actions` to `model`.
///
/// On error the model may be partially updated; callers that need
/// all-or-nothing semantics apply to a clone.
pub fn apply(model: &mut Model, actions: &[Action]) -> Result<ApplyReport, ApplyError> {
    let mut applier = Applier {
        model,
        promises: HashMap::new(),
        pending: Vec::new(),
        report: ApplyReport::default(),
    };

    let mut modifications = Vec::new();
    let mut deletions = Vec::new();
    for action in actions {
        let target = applier.resolve(&action.parent)?;
        for (collection, entries) in &action.extend {
            for entry in entries {
                match entry {
                    Extension::Create(new) => {
                        applier.create(&target, *collection, new)?;
                    }
                    Extension::Reference(r) => applier.move_under(r, &target)?,
                }
            }
        }
        for (field, change) in &action.modify {
            modifications.push((target.clone(), *field, change));
        }
        for (collection, refs) in &action.delete {
            for r in refs {
                deletions.push((target.clone(), *collection, r));
            }
        }
    }

    for pending in std::mem::take(&mut applier.pending) {
        applier.resolve_pending(pending)?;
    }
    for (target, field, change) in modifications {
        applier.modify(&target, field, change)?;
    }

    for (parent, collection, r) in deletions {
        applier.delete(&parent, collection, r)?;
    }

    let report = applier.report;
    tracing::info!(
        created = report.created,
        modified = report.modified,
        moved = report.moved,
        deleted = report.deleted,
        "applied change set"
    );
    Ok(report)
}

/// A reference held by a created object, resolved in phase 2.
enum Pending<'a> {
    TypeRef(ObjectId, &'a Ref),
    Definition(ObjectId, &'a Ref),
    DataType(ObjectId, &'a Ref),
    Values(ObjectId, &'a [Ref]),
}

struct Applier<'m, 'a> {
    model: &'m mut Model,
    promises: HashMap<String, ObjectId>,
    pending: Vec<Pending<'a>>,
    report: ApplyReport,
}

impl<'m, 'a> Applier<'m, 'a> {
    fn resolve(&self, r: &Ref) -> Result<ObjectId, ApplyError> {
        match r {
            Ref::Existing(id) if self.model.contains(id) => Ok(id.clone()),
            Ref::Existing(id) => Err(ModelError::UnknownObject(id.clone()).into()),
            Ref::Promised(token) => self
                .promises
                .get(token)
                .cloned()
                .ok_or_else(|| ApplyError::UnresolvedPromise(token.clone())),
        }
    }

    /// Object already created for `promise_id` in this run. Descriptors
    /// sharing a promise key denote the same object.
    fn promised(&self, promise_id: &str) -> Option<ObjectId> {
        let id = self.promises.get(promise_id).cloned();
        if let Some(id) = &id {
            tracing::debug!(promise = promise_id, object = %id, "promise already fulfilled");
        }
        id
    }

    fn register(&mut self, promise_id: &str, id: &ObjectId) {
        self.promises.insert(promise_id.to_owned(), id.clone());
    }

    fn insert(&mut self, parent: &ObjectId, element: Element) -> Result<ObjectId, ApplyError> {
        let id = self.model.insert(Some(parent), element)?;
        self.report.created += 1;
        Ok(id)
    }

    fn move_under(&mut self, r: &Ref, parent: &ObjectId) -> Result<(), ApplyError> {
        let id = self.resolve(r)?;
        self.model.move_to(&id, parent)?;
        tracing::debug!(object = %id, parent = %parent, "moved");
        self.report.moved += 1;
        Ok(())
    }

    fn create(
        &mut self,
        parent: &ObjectId,
        collection: Collection,
        new: &'a NewElement,
    ) -> Result<ObjectId, ApplyError> {
        match (collection, new) {
            (Collection::RequirementTypesFolders, NewElement::TypesFolder(folder)) => {
                self.create_types_folder(parent, folder)
            }
            (Collection::DataTypeDefinitions, NewElement::DataType(dt)) => {
                self.create_data_type(parent, dt)
            }
            (Collection::Values, NewElement::EnumValue(value)) => {
                self.create_enum_value(parent, value)
            }
            (Collection::RequirementTypes, NewElement::RequirementType(rt)) => {
                self.create_requirement_type(parent, rt)
            }
            (Collection::AttributeDefinitions, NewElement::AttributeDefinition(def)) => {
                self.create_attribute_definition(parent, def)
            }
            (Collection::Folders, NewElement::WorkItem(item)) => {
                self.create_work_item(parent, item, true)
            }
            (Collection::Requirements, NewElement::WorkItem(item)) => {
                self.create_work_item(parent, item, false)
            }
            (Collection::Attributes, NewElement::AttributeValue(value)) => {
                self.create_attribute_value(parent, value)
            }
            _ => Err(ApplyError::InvalidExtension {
                collection,
                target: parent.clone(),
                reason: "descriptor does not belong to this collection".to_owned(),
            }),
        }
    }

    fn create_types_folder(
        &mut self,
        parent: &ObjectId,
        folder: &'a NewTypesFolder,
    ) -> Result<ObjectId, ApplyError> {
        let id = self.insert(
            parent,
            Element::new(ElementData::TypesFolder)
                .identifier(&folder.identifier)
                .long_name(&folder.long_name),
        )?;
        for dt in &folder.data_type_definitions {
            self.create_data_type(&id, dt)?;
        }
        for rt in &folder.requirement_types {
            self.create_requirement_type(&id, rt)?;
        }
        Ok(id)
    }

    fn create_data_type(
        &mut self,
        parent: &ObjectId,
        dt: &'a NewDataType,
    ) -> Result<ObjectId, ApplyError> {
        if let Some(id) = self.promised(&dt.promise_id) {
            return Ok(id);
        }
        let id = self.insert(
            parent,
            Element::new(ElementData::DataTypeDefinition)
                .identifier(&dt.identifier)
                .long_name(&dt.long_name),
        )?;
        self.register(&dt.promise_id, &id);
        for value in &dt.values {
            self.create_enum_value(&id, value)?;
        }
        Ok(id)
    }

    fn create_enum_value(
        &mut self,
        parent: &ObjectId,
        value: &'a NewEnumValue,
    ) -> Result<ObjectId, ApplyError> {
        if let Some(id) = self.promised(&value.promise_id) {
            return Ok(id);
        }
        let id = self.insert(
            parent,
            Element::new(ElementData::EnumValue).long_name(&value.long_name),
        )?;
        self.register(&value.promise_id, &id);
        Ok(id)
    }

    fn create_requirement_type(
        &mut self,
        parent: &ObjectId,
        rt: &'a NewRequirementType,
    ) -> Result<ObjectId, ApplyError> {
        if let Some(id) = self.promised(&rt.promise_id) {
            return Ok(id);
        }
        let id = self.insert(
            parent,
            Element::new(ElementData::RequirementType)
                .identifier(&rt.identifier)
                .long_name(&rt.long_name),
        )?;
        self.register(&rt.promise_id, &id);
        for def in &rt.attribute_definitions {
            self.create_attribute_definition(&id, def)?;
        }
        Ok(id)
    }

    fn create_attribute_definition(
        &mut self,
        parent: &ObjectId,
        def: &'a NewAttributeDefinition,
    ) -> Result<ObjectId, ApplyError> {
        if let Some(id) = self.promised(&def.promise_id) {
            return Ok(id);
        }
        let data = match &def.kind {
            AttributeDefinitionKind::AttributeDefinition => ElementData::AttributeDefinition,
            AttributeDefinitionKind::AttributeDefinitionEnumeration { multi_valued, .. } => {
                ElementData::AttributeDefinitionEnumeration {
                    data_type: None,
                    multi_valued: *multi_valued,
                }
            }
        };
        let id = self.insert(
            parent,
            Element::new(data)
                .identifier(&def.identifier)
                .long_name(&def.long_name),
        )?;
        self.register(&def.promise_id, &id);
        if let AttributeDefinitionKind::AttributeDefinitionEnumeration { data_type, .. } = &def.kind
        {
            self.pending.push(Pending::DataType(id.clone(), data_type));
        }
        Ok(id)
    }

    fn create_work_item(
        &mut self,
        parent: &ObjectId,
        item: &'a NewWorkItem,
        is_folder: bool,
    ) -> Result<ObjectId, ApplyError> {
        let data = if is_folder {
            ElementData::folder()
        } else {
            ElementData::requirement()
        };
        let mut element = Element::new(data)
            .identifier(&item.identifier)
            .long_name(&item.long_name);
        element.text = item.text.clone();
        let id = self.insert(parent, element)?;
        tracing::debug!(identifier = %item.identifier, uuid = %id, "created work item");

        if let Some(type_ref) = &item.type_ref {
            self.pending.push(Pending::TypeRef(id.clone(), type_ref));
        }
        for value in &item.attributes {
            self.create_attribute_value(&id, value)?;
        }
        for (children, folders) in [(&item.requirements, false), (&item.folders, true)] {
            for child in children {
                match child {
                    ChildEntry::Create(new) => {
                        self.create_work_item(&id, new, folders)?;
                    }
                    ChildEntry::Existing(r) => self.move_under(r, &id)?,
                }
            }
        }
        Ok(id)
    }

    fn create_attribute_value(
        &mut self,
        parent: &ObjectId,
        value: &'a NewAttributeValue,
    ) -> Result<ObjectId, ApplyError> {
        let id = self.insert(
            parent,
            Element::new(ElementData::AttributeValue {
                kind: value.kind.clone(),
                definition: None,
                value: value.value.clone(),
                values: Vec::new(),
            }),
        )?;
        self.pending.push(Pending::Definition(id.clone(), &value.definition));
        if !value.values.is_empty() {
            self.pending.push(Pending::Values(id.clone(), &value.values));
        }
        Ok(id)
    }

    fn resolve_pending(&mut self, pending: Pending<'a>) -> Result<(), ApplyError> {
        match pending {
            Pending::TypeRef(target, r) => {
                let resolved = self.resolve(r)?;
                self.set_type(&target, Some(resolved), Field::Type)
            }
            Pending::Definition(target, r) => {
                let resolved = self.resolve(r)?;
                if let ElementData::AttributeValue { definition, .. } = self.data_mut(&target)? {
                    *definition = Some(resolved);
                }
                Ok(())
            }
            Pending::DataType(target, r) => {
                let resolved = self.resolve(r)?;
                self.set_data_type(&target, resolved)
            }
            Pending::Values(target, refs) => {
                let resolved = self.resolve_all(refs)?;
                self.set_values(&target, resolved)
            }
        }
    }

    fn resolve_all(&self, refs: &[Ref]) -> Result<Vec<ObjectId>, ApplyError> {
        refs.iter().map(|r| self.resolve(r)).collect()
    }

    fn data_mut(&mut self, id: &ObjectId) -> Result<&mut ElementData, ApplyError> {
        self.model
            .get_mut(id)
            .map(|e| &mut e.data)
            .ok_or_else(|| ModelError::UnknownObject(id.clone()).into())
    }

    fn set_type(
        &mut self,
        target: &ObjectId,
        value: Option<ObjectId>,
        field: Field,
    ) -> Result<(), ApplyError> {
        match self.data_mut(target)? {
            ElementData::Folder { type_ref } | ElementData::Requirement { type_ref } => {
                *type_ref = value;
                Ok(())
            }
            _ => Err(invalid(field, target, "not a work item")),
        }
    }

    fn set_data_type(&mut self, target: &ObjectId, value: ObjectId) -> Result<(), ApplyError> {
        match self.data_mut(target)? {
            ElementData::AttributeDefinitionEnumeration { data_type, .. } => {
                *data_type = Some(value);
                Ok(())
            }
            _ => Err(invalid(
                Field::DataType,
                target,
                "not an enumeration attribute definition",
            )),
        }
    }

    fn set_values(&mut self, target: &ObjectId, resolved: Vec<ObjectId>) -> Result<(), ApplyError> {
        match self.data_mut(target)? {
            ElementData::AttributeValue { values, .. } => {
                *values = resolved;
                Ok(())
            }
            _ => Err(invalid(Field::Values, target, "not an attribute value")),
        }
    }

    fn modify(
        &mut self,
        target: &ObjectId,
        field: Field,
        change: &FieldChange,
    ) -> Result<(), ApplyError> {
        match (field, change) {
            (Field::Identifier | Field::LongName | Field::Text, FieldChange::Value(value)) => {
                let text = value
                    .as_text()
                    .ok_or_else(|| invalid(field, target, "expected text"))?
                    .to_owned();
                let element = self
                    .model
                    .get_mut(target)
                    .ok_or_else(|| ModelError::UnknownObject(target.clone()))?;
                match field {
                    Field::Identifier => element.identifier = text,
                    Field::LongName => element.long_name = text,
                    _ => element.text = Some(text),
                }
            }
            (Field::Text, FieldChange::Unset) => {
                if let Some(element) = self.model.get_mut(target) {
                    element.text = None;
                }
            }
            (Field::Type, FieldChange::Ref(r)) => {
                let resolved = self.resolve(r)?;
                self.set_type(target, Some(resolved), field)?;
            }
            (Field::Type, FieldChange::Unset) => self.set_type(target, None, field)?,
            (Field::Value, FieldChange::Value(new)) => match self.data_mut(target)? {
                ElementData::AttributeValue { value, .. } => *value = Some(new.clone()),
                _ => return Err(invalid(field, target, "not an attribute value")),
            },
            (Field::Value, FieldChange::Unset) => match self.data_mut(target)? {
                ElementData::AttributeValue { value, .. } => *value = None,
                _ => return Err(invalid(field, target, "not an attribute value")),
            },
            (Field::Values, FieldChange::Refs(refs)) => {
                let resolved = self.resolve_all(refs)?;
                self.set_values(target, resolved)?;
            }
            (Field::DataType, FieldChange::Ref(r)) => {
                let resolved = self.resolve(r)?;
                self.set_data_type(target, resolved)?;
            }
            (Field::MultiValued, FieldChange::Value(FieldValue::Boolean(flag))) => {
                match self.data_mut(target)? {
                    ElementData::AttributeDefinitionEnumeration { multi_valued, .. } => {
                        *multi_valued = *flag
                    }
                    _ => {
                        return Err(invalid(
                            field,
                            target,
                            "not an enumeration attribute definition",
                        ))
                    }
                }
            }
            _ => return Err(invalid(field, target, "unsupported assignment")),
        }
        self.report.modified += 1;
        Ok(())
    }

    fn delete(
        &mut self,
        parent: &ObjectId,
        collection: Collection,
        r: &Ref,
    ) -> Result<(), ApplyError> {
        let id = self.resolve(r)?;
        let current_parent = self.model.get(&id).and_then(|e| e.parent.clone());
        if current_parent.as_ref() != Some(parent) {
            tracing::warn!(
                object = %id,
                collection = %collection,
                "skipping deletion of object no longer below {parent}"
            );
            return Ok(());
        }
        self.report.deleted += self.model.remove(&id)?;
        Ok(())
    }
}

fn invalid(field: Field, target: &ObjectId, reason: &str) -> ApplyError {
    ApplyError::InvalidModification {
        field,
        target: target.clone(),
        reason: reason.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
