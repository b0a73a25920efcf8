//! Schema Reconciler: the types folder with its data type definitions,
//! requirement types and attribute definitions.

use std::collections::HashSet;

use rmbridge_core::{
    Action, AttributeDefinitionKind, AttributeDefinitionSpec, Collection, Extension, Field,
    FieldChange, NewAttributeDefinition, NewDataType, NewElement, NewEnumValue,
    NewRequirementType, NewTypesFolder, Ref, RequirementTypeSpec,
};
use rmbridge_model::{Element, ElementData, ElementKind};

use crate::context::{TrackerContext, TYPES_FOLDER_IDENTIFIER, TYPES_FOLDER_NAME};
use crate::error::ItemError;

/// Schema part of a change set.
#[derive(Debug, Default)]
pub(crate) struct SchemaChanges {
    /// Set when the module has no types folder yet; the compiler nests it
    /// in the module action.
    pub types_folder: Option<NewTypesFolder>,
    pub actions: Vec<Action>,
}

pub(crate) fn reconcile_schema(ctx: &mut TrackerContext<'_, '_>) -> SchemaChanges {
    match ctx.types_folder {
        None => SchemaChanges {
            types_folder: Some(create_types_folder(ctx)),
            actions: Vec::new(),
        },
        Some(tf) => SchemaChanges {
            types_folder: None,
            actions: modify_types_folder(ctx, tf),
        },
    }
}

// ---------------------------------------------------------------------------
// Create descriptors
// ---------------------------------------------------------------------------

fn create_types_folder(ctx: &mut TrackerContext<'_, '_>) -> NewTypesFolder {
    let tracker = ctx.tracker;
    let data_type_definitions = tracker
        .data_types
        .iter()
        .map(|(name, options)| new_data_type(name, options.iter()))
        .collect();
    let requirement_types = tracker
        .requirement_types
        .iter()
        .map(|(identifier, spec)| create_requirement_type(ctx, identifier, spec))
        .collect();
    NewTypesFolder {
        long_name: TYPES_FOLDER_NAME.to_owned(),
        identifier: TYPES_FOLDER_IDENTIFIER.to_owned(),
        data_type_definitions,
        requirement_types,
    }
}

fn new_enum_value(data_type: &str, option: &str) -> NewEnumValue {
    NewEnumValue {
        long_name: option.to_owned(),
        promise_id: format!("EnumValue {data_type} {option}"),
    }
}

/// Data type with one value per distinct option.
fn new_data_type<'a>(name: &str, options: impl Iterator<Item = &'a String>) -> NewDataType {
    let mut seen = HashSet::new();
    NewDataType {
        identifier: name.to_owned(),
        long_name: name.to_owned(),
        promise_id: format!("EnumerationDataTypeDefinition {name}"),
        values: options
            .filter(|option| seen.insert(*option))
            .map(|option| new_enum_value(name, option))
            .collect(),
    }
}

fn create_requirement_type(
    ctx: &mut TrackerContext<'_, '_>,
    identifier: &str,
    spec: &RequirementTypeSpec,
) -> NewRequirementType {
    let mut attribute_definitions = Vec::new();
    for (name, attribute) in &spec.attributes {
        match create_attribute_definition(ctx, name, attribute, identifier) {
            Ok(def) => attribute_definitions.push(def),
            Err(e) => ctx.report(format!("In RequirementType '{}': {e}", spec.long_name)),
        }
    }
    NewRequirementType {
        identifier: identifier.to_owned(),
        long_name: spec.long_name.clone(),
        promise_id: format!("RequirementType {identifier}"),
        attribute_definitions,
    }
}

fn create_attribute_definition(
    ctx: &mut TrackerContext<'_, '_>,
    name: &str,
    attribute: &AttributeDefinitionSpec,
    requirement_type: &str,
) -> Result<NewAttributeDefinition, ItemError> {
    let identifier = format!("{name} {requirement_type}");
    let kind = if attribute.kind.is_enum() {
        let data_type = data_type_ref(ctx, name, attribute, &identifier)?;
        AttributeDefinitionKind::AttributeDefinitionEnumeration {
            data_type,
            multi_valued: attribute.multi_valued(),
        }
    } else {
        AttributeDefinitionKind::AttributeDefinition
    };
    Ok(NewAttributeDefinition {
        promise_id: format!("{} {identifier}", kind.type_name()),
        identifier,
        long_name: name.to_owned(),
        kind,
    })
}

/// Data type an enumeration definition points at.
///
/// A data type missing from the snapshot cannot even be promised; the
/// definition's own promise is then marked faulty so attribute values
/// referring to it are rejected.
fn data_type_ref(
    ctx: &mut TrackerContext<'_, '_>,
    name: &str,
    attribute: &AttributeDefinitionSpec,
    identifier: &str,
) -> Result<Ref, ItemError> {
    let data_type = attribute.data_type_name(name);
    if !ctx.tracker.data_types.contains_key(data_type) {
        ctx.faulty_promises
            .insert(format!("AttributeDefinitionEnumeration {identifier}"));
        return Err(ItemError::InvalidAttributeDefinition(format!(
            "Invalid AttributeDefinitionEnumeration found: '{name}'. Missing its datatype \
             definition in `data_types`."
        )));
    }
    Ok(match ctx.data_type(data_type)? {
        Some(existing) => Ref::existing(&existing.uuid),
        None => Ref::promise(format!("EnumerationDataTypeDefinition {data_type}")),
    })
}

// ---------------------------------------------------------------------------
// Diff against an existing types folder
// ---------------------------------------------------------------------------

fn modify_types_folder(ctx: &mut TrackerContext<'_, '_>, tf: &Element) -> Vec<Action> {
    let model = ctx.model();
    let tracker = ctx.tracker;
    let mut folder_action = Action::new(Ref::existing(&tf.uuid));
    let mut actions = Vec::new();

    for dtdef in model.children(&tf.uuid, ElementKind::DataTypeDefinition) {
        let known = tracker.data_types.contains_key(&dtdef.identifier)
            || tracker.data_types.contains_key(&dtdef.long_name);
        if !known {
            folder_action.push_delete(Collection::DataTypeDefinitions, Ref::existing(&dtdef.uuid));
            ctx.invalid_enum_values.extend(
                model
                    .children(&dtdef.uuid, ElementKind::EnumValue)
                    .into_iter()
                    .map(|v| v.uuid.clone()),
            );
        }
    }

    let mut data_type_mods = Vec::new();
    for (name, options) in &tracker.data_types {
        match ctx.finder.data_type(name, &tf.uuid) {
            Err(e) => ctx.report(format!("In data type '{name}': {e}")),
            Ok(None) => folder_action.push_extend(
                Collection::DataTypeDefinitions,
                Extension::Create(NewElement::DataType(new_data_type(name, options.iter()))),
            ),
            Ok(Some(dtdef)) => data_type_mods.extend(modify_data_type(ctx, dtdef, name, options)),
        }
    }

    for rt in model.children(&tf.uuid, ElementKind::RequirementType) {
        if !tracker.requirement_types.contains_key(&rt.identifier) {
            folder_action.push_delete(Collection::RequirementTypes, Ref::existing(&rt.uuid));
        }
    }

    let mut requirement_type_mods = Vec::new();
    for (identifier, spec) in &tracker.requirement_types {
        match ctx.finder.requirement_type(identifier, &tf.uuid) {
            Err(e) => ctx.report(format!("In RequirementType '{}': {e}", spec.long_name)),
            Ok(None) => {
                let created = create_requirement_type(ctx, identifier, spec);
                folder_action.push_extend(
                    Collection::RequirementTypes,
                    Extension::Create(NewElement::RequirementType(created)),
                );
            }
            Ok(Some(rt)) => {
                requirement_type_mods.extend(modify_requirement_type(ctx, rt, identifier, spec))
            }
        }
    }

    if !folder_action.is_empty() {
        actions.push(folder_action);
    }
    actions.extend(data_type_mods);
    actions.extend(requirement_type_mods);
    actions
}

fn modify_data_type(
    ctx: &TrackerContext<'_, '_>,
    dtdef: &Element,
    name: &str,
    options: &[String],
) -> Option<Action> {
    let mut action = Action::new(Ref::existing(&dtdef.uuid));
    if dtdef.long_name != name {
        action.set(Field::LongName, FieldChange::text(name));
    }
    if dtdef.identifier != name {
        action.set(Field::Identifier, FieldChange::text(name));
    }

    let values = ctx.model().children(&dtdef.uuid, ElementKind::EnumValue);
    let existing: HashSet<&str> = values.iter().map(|v| v.long_name.as_str()).collect();
    let mut seen = HashSet::new();
    for option in options {
        if !existing.contains(option.as_str()) && seen.insert(option.as_str()) {
            action.push_extend(
                Collection::Values,
                Extension::Create(NewElement::EnumValue(new_enum_value(name, option))),
            );
        }
    }
    for value in values {
        if !options.contains(&value.long_name) {
            action.push_delete(Collection::Values, Ref::existing(&value.uuid));
        }
    }

    (!action.is_empty()).then_some(action)
}

fn definition_kind_of(attribute: &AttributeDefinitionSpec) -> ElementKind {
    if attribute.kind.is_enum() {
        ElementKind::AttributeDefinitionEnumeration
    } else {
        ElementKind::AttributeDefinition
    }
}

/// Action for the requirement type itself, followed by one action per
/// modified attribute definition.
fn modify_requirement_type(
    ctx: &mut TrackerContext<'_, '_>,
    rt: &Element,
    identifier: &str,
    spec: &RequirementTypeSpec,
) -> Vec<Action> {
    let mut action = Action::new(Ref::existing(&rt.uuid));
    if rt.long_name != spec.long_name {
        action.set(Field::LongName, FieldChange::text(&spec.long_name));
    }

    let definitions = ctx
        .model()
        .search(&ElementKind::ATTRIBUTE_DEFINITIONS, Some(&rt.uuid));
    let wanted: HashSet<String> = spec
        .attributes
        .keys()
        .map(|name| format!("{name} {identifier}"))
        .collect();
    for def in &definitions {
        if !wanted.contains(&def.identifier) {
            action.push_delete(Collection::AttributeDefinitions, Ref::existing(&def.uuid));
            ctx.dropped_definitions.insert(def.uuid.clone());
        }
    }

    let mut definition_mods = Vec::new();
    for (name, attribute) in &spec.attributes {
        let def_identifier = format!("{name} {identifier}");
        let existing = definitions
            .iter()
            .find(|def| def.identifier == def_identifier);
        match existing {
            Some(def) if def.kind() == definition_kind_of(attribute) => {
                match modify_attribute_definition(ctx, def, name, attribute, &def_identifier) {
                    Ok(Some(modified)) => definition_mods.push(modified),
                    Ok(None) => {}
                    Err(e) => ctx.report(format!("In RequirementType '{}': {e}", spec.long_name)),
                }
            }
            Some(def) => {
                // Plain <-> enumeration switch: replace the definition.
                action.push_delete(Collection::AttributeDefinitions, Ref::existing(&def.uuid));
                ctx.dropped_definitions.insert(def.uuid.clone());
                push_created_definition(ctx, &mut action, name, attribute, identifier, spec);
            }
            None => push_created_definition(ctx, &mut action, name, attribute, identifier, spec),
        }
    }

    let mut actions = Vec::with_capacity(definition_mods.len() + 1);
    if !action.is_empty() {
        actions.push(action);
    }
    actions.extend(definition_mods);
    actions
}

fn push_created_definition(
    ctx: &mut TrackerContext<'_, '_>,
    action: &mut Action,
    name: &str,
    attribute: &AttributeDefinitionSpec,
    requirement_type: &str,
    spec: &RequirementTypeSpec,
) {
    match create_attribute_definition(ctx, name, attribute, requirement_type) {
        Ok(def) => action.push_extend(
            Collection::AttributeDefinitions,
            Extension::Create(NewElement::AttributeDefinition(def)),
        ),
        Err(e) => ctx.report(format!("In RequirementType '{}': {e}", spec.long_name)),
    }
}

fn modify_attribute_definition(
    ctx: &mut TrackerContext<'_, '_>,
    def: &Element,
    name: &str,
    attribute: &AttributeDefinitionSpec,
    identifier: &str,
) -> Result<Option<Action>, ItemError> {
    let mut action = Action::new(Ref::existing(&def.uuid));
    if def.long_name != name {
        action.set(Field::LongName, FieldChange::text(name));
    }
    if let ElementData::AttributeDefinitionEnumeration {
        data_type,
        multi_valued,
    } = &def.data
    {
        match data_type_ref(ctx, name, attribute, identifier)? {
            Ref::Existing(uuid) if data_type.as_ref() == Some(&uuid) => {}
            target => action.set(Field::DataType, FieldChange::Ref(target)),
        }
        if *multi_valued != attribute.multi_valued() {
            action.set(Field::MultiValued, FieldChange::flag(attribute.multi_valued()));
        }
    }
    Ok((!action.is_empty()).then_some(action))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
