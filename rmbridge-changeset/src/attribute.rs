//! Attribute Reconciler.
//!
//! Validates one snapshot attribute value against its declared kind and
//! decides whether the owning work item needs a new attribute value, a
//! modification of the existing one, or nothing.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rmbridge_core::{
    Action, AttributeDefinitionKind, Field, FieldChange, FieldKind, FieldValue,
    NewAttributeValue, Ref, WorkItem,
};
use rmbridge_model::{Element, ElementData, ElementKind};

use crate::context::TrackerContext;
use crate::error::ItemError;

/// Outcome for one attribute of an existing work item.
#[derive(Debug)]
pub(crate) enum AttributeDecision {
    Create(NewAttributeValue),
    Modify(Action),
    Unchanged,
}

/// How the attribute loop of a work item continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Proceed,
    Skip,
    Stop,
}

/// Pre-checks an item attribute before it is reconciled.
///
/// Attributes without a declared item type stop the loop for the whole
/// item; undeclared attribute names are reported and skipped.
pub(crate) fn check_attribute(
    ctx: &mut TrackerContext<'_, '_>,
    item: &WorkItem,
    name: &str,
    value: &FieldValue,
) -> Flow {
    let Some(type_id) = item.declared_type() else {
        ctx.report(format!(
            "Invalid workitem '{}'. Missing type but attributes found",
            item.id
        ));
        return Flow::Stop;
    };

    if is_legacy_folder_marker(name, value) {
        return Flow::Skip;
    }

    if let Some(spec) = ctx.tracker.requirement_types.get(type_id) {
        if !spec.attributes.contains_key(name) {
            ctx.report(format!(
                "Invalid workitem '{}'. Invalid field found: field name '{name}' not defined \
                 in attributes of requirement type '{type_id}'",
                item.id
            ));
            return Flow::Skip;
        }
    }
    Flow::Proceed
}

/// `Type: Folder` marked folders in older exports.
fn is_legacy_folder_marker(name: &str, value: &FieldValue) -> bool {
    if name != "Type" {
        return false;
    }
    match value {
        FieldValue::Text(text) => text == "Folder",
        FieldValue::List(values) => values.iter().all(|v| v == "Folder"),
        _ => false,
    }
}

/// A value that passed validation.
struct Checked<'s> {
    kind: FieldKind,
    /// Enum options, in snapshot order.
    options: &'s [String],
    /// Data type name; only meaningful for enums.
    data_type: &'s str,
}

fn validate<'s>(
    ctx: &TrackerContext<'_, 's>,
    name: &'s str,
    value: &'s FieldValue,
    type_id: &str,
) -> Result<Checked<'s>, ItemError> {
    let tracker = ctx.tracker;
    let spec = tracker
        .requirement_types
        .get(type_id)
        .ok_or_else(|| unknown_type(type_id))?;
    let def = spec.attributes.get(name).ok_or_else(|| {
        ItemError::InvalidFieldValue(format!(
            "Invalid field found: field name '{name}' not defined in attributes of \
             requirement type '{type_id}'"
        ))
    })?;
    let kind = def.kind.clone();

    if kind.is_enum() {
        let data_type = def.data_type_name(name);
        let Some(declared) = tracker.data_types.get(data_type) else {
            return Err(ItemError::InvalidFieldValue(format!(
                "Invalid field found: '{name}'. Missing its datatype definition in `data_types`."
            )));
        };
        let options = match value.as_list() {
            Some(options) if !options.is_empty() && options.iter().all(|o| declared.contains(o)) => {
                options
            }
            _ => return Err(invalid_value("values", value, name)),
        };
        return Ok(Checked {
            kind,
            options,
            data_type,
        });
    }

    let matches = match (&kind, value) {
        (FieldKind::Other(other), _) => {
            tracing::warn!("Unknown field type '{other}' for {name}: {value}");
            true
        }
        (_, FieldValue::Null) => false,
        (FieldKind::Boolean, FieldValue::Boolean(_)) => true,
        (FieldKind::Date, FieldValue::Text(text)) => parse_date(text).is_some(),
        (FieldKind::Float, FieldValue::Float(_)) => true,
        (FieldKind::Integer, FieldValue::Integer(_)) => true,
        (FieldKind::String, FieldValue::Text(_)) => true,
        _ => false,
    };
    if !matches {
        return Err(invalid_value("value", value, name));
    }
    Ok(Checked {
        kind,
        options: &[],
        data_type: name,
    })
}

pub(crate) fn unknown_type(type_id: &str) -> ItemError {
    ItemError::InvalidWorkItemType(format!(
        "Faulty workitem in snapshot: Unknown workitem-type '{type_id}'"
    ))
}

fn invalid_value(key: &str, value: &FieldValue, name: &str) -> ItemError {
    ItemError::InvalidFieldValue(format!("Invalid field found: {key} {value} for '{name}'"))
}

/// Dates travel as RFC 3339, naive ISO 8601 date-times or plain dates.
fn parse_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn definition_kind(kind: &FieldKind) -> ElementKind {
    if kind.is_enum() {
        ElementKind::AttributeDefinitionEnumeration
    } else {
        ElementKind::AttributeDefinition
    }
}

/// The attribute definition an attribute value points at.
enum Definition<'m> {
    Existing(&'m Element),
    Promised(String),
}

impl Definition<'_> {
    fn to_ref(&self) -> Ref {
        match self {
            Definition::Existing(def) => Ref::existing(&def.uuid),
            Definition::Promised(token) => Ref::promise(token.clone()),
        }
    }
}

fn resolve_definition<'m>(
    ctx: &TrackerContext<'m, '_>,
    name: &str,
    type_id: &str,
    kind: &FieldKind,
) -> Result<Definition<'m>, ItemError> {
    let identifier = format!("{name} {type_id}");
    if let Some(def) = ctx.attribute_definition(definition_kind(kind), &identifier)? {
        return Ok(Definition::Existing(def));
    }
    let promise = format!(
        "{} {identifier}",
        AttributeDefinitionKind::type_name_for(kind)
    );
    if ctx.faulty_promises.contains(&promise) {
        return Err(ItemError::InvalidFieldValue(format!(
            "Invalid field found: No AttributeDefinition '{name}' promised."
        )));
    }
    Ok(Definition::Promised(promise))
}

/// References to the enum values named by `options`; values missing from
/// the model are promised.
fn enum_value_refs(
    ctx: &TrackerContext<'_, '_>,
    data_type: &str,
    options: &[String],
) -> Result<Vec<Ref>, ItemError> {
    let dtdef = ctx.data_type(data_type)?;
    let mut refs = Vec::with_capacity(options.len());
    for option in options {
        let existing = match dtdef {
            Some(dt) => ctx
                .finder
                .enum_value(option, &dt.uuid)?
                .filter(|v| !ctx.invalid_enum_values.contains(&v.uuid)),
            None => None,
        };
        refs.push(match existing {
            Some(value) => Ref::existing(&value.uuid),
            None => Ref::promise(format!("EnumValue {data_type} {option}")),
        });
    }
    Ok(refs)
}

fn build_value(
    ctx: &TrackerContext<'_, '_>,
    value: &FieldValue,
    checked: &Checked<'_>,
    definition: &Definition<'_>,
) -> Result<NewAttributeValue, ItemError> {
    let (value, values) = if checked.kind.is_enum() {
        (None, enum_value_refs(ctx, checked.data_type, checked.options)?)
    } else {
        (Some(value.clone()), Vec::new())
    };
    Ok(NewAttributeValue {
        kind: checked.kind.clone(),
        definition: definition.to_ref(),
        value,
        values,
    })
}

/// Create descriptor for one snapshot attribute.
pub(crate) fn create_value(
    ctx: &TrackerContext<'_, '_>,
    name: &str,
    value: &FieldValue,
    type_id: &str,
) -> Result<NewAttributeValue, ItemError> {
    let checked = validate(ctx, name, value, type_id)?;
    let definition = resolve_definition(ctx, name, type_id, &checked.kind)?;
    build_value(ctx, value, &checked, &definition)
}

/// Compare one snapshot attribute with the matching value on `owner`.
pub(crate) fn reconcile_value(
    ctx: &TrackerContext<'_, '_>,
    owner: &Element,
    name: &str,
    value: &FieldValue,
    type_id: &str,
) -> Result<AttributeDecision, ItemError> {
    let checked = validate(ctx, name, value, type_id)?;
    let definition = resolve_definition(ctx, name, type_id, &checked.kind)?;
    let Definition::Existing(def) = definition else {
        return build_value(ctx, value, &checked, &definition).map(AttributeDecision::Create);
    };

    let model = ctx.model();
    let current = model
        .children(&owner.uuid, ElementKind::AttributeValue)
        .into_iter()
        .find(|attr| attr.definition() == Some(&def.uuid));
    let Some(current) = current else {
        return build_value(ctx, value, &checked, &definition).map(AttributeDecision::Create);
    };
    let ElementData::AttributeValue {
        value: current_value,
        values: current_values,
        ..
    } = &current.data
    else {
        return Ok(AttributeDecision::Unchanged);
    };

    let mut action = Action::new(Ref::existing(&current.uuid));
    if checked.kind.is_enum() {
        let resolved: Vec<&str> = current_values
            .iter()
            .filter_map(|id| model.get(id))
            .map(|v| v.long_name.as_str())
            .collect();
        let actual: HashSet<&str> = resolved.iter().copied().collect();
        let wanted: HashSet<&str> = checked.options.iter().map(String::as_str).collect();
        if actual == wanted && resolved.len() == current_values.len() {
            return Ok(AttributeDecision::Unchanged);
        }
        let refs = enum_value_refs(ctx, checked.data_type, checked.options)?;
        action.set(Field::Values, FieldChange::Refs(refs));
    } else {
        if same_value(&checked.kind, current_value.as_ref(), value) {
            return Ok(AttributeDecision::Unchanged);
        }
        action.set(Field::Value, FieldChange::Value(value.clone()));
    }
    Ok(AttributeDecision::Modify(action))
}

fn same_value(kind: &FieldKind, current: Option<&FieldValue>, wanted: &FieldValue) -> bool {
    match (kind, current, wanted) {
        (FieldKind::Date, Some(FieldValue::Text(cur)), FieldValue::Text(new)) => {
            match (parse_date(cur), parse_date(new)) {
                (Some(a), Some(b)) => a == b,
                _ => cur == new,
            }
        }
        (_, Some(cur), _) => cur == wanted,
        (_, None, _) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find::Finder;
    use indexmap::IndexMap;
    use rmbridge_core::{
        AttributeDefinitionSpec, ItemId, ObjectId, RequirementTypeSpec, TrackerSnapshot,
    };
    use rmbridge_model::{Model, ModelQuery};
    use rstest::rstest;

    fn id(s: &str) -> ObjectId {
        ObjectId::from(s)
    }

    fn tracker() -> TrackerSnapshot {
        let mut attributes = IndexMap::new();
        attributes.insert(
            "Priority".to_string(),
            AttributeDefinitionSpec::new(FieldKind::Enum),
        );
        attributes.insert(
            "Due".to_string(),
            AttributeDefinitionSpec::new(FieldKind::Date),
        );
        attributes.insert(
            "Effort".to_string(),
            AttributeDefinitionSpec::new(FieldKind::Integer),
        );
        attributes.insert(
            "Score".to_string(),
            AttributeDefinitionSpec::new(FieldKind::Float),
        );
        attributes.insert(
            "Done".to_string(),
            AttributeDefinitionSpec::new(FieldKind::Boolean),
        );
        attributes.insert(
            "Note".to_string(),
            AttributeDefinitionSpec::new(FieldKind::String),
        );
        let mut requirement_types = IndexMap::new();
        requirement_types.insert(
            "T1".to_string(),
            RequirementTypeSpec {
                long_name: "Type 1".into(),
                attributes,
            },
        );
        let mut data_types = IndexMap::new();
        data_types.insert(
            "Priority".to_string(),
            vec!["Low".to_string(), "High".to_string()],
        );
        TrackerSnapshot {
            id: Some(ItemId::from("M")),
            long_name: None,
            data_types,
            requirement_types,
            items: vec![],
        }
    }

    /// Module with a types folder holding Priority {Low, High}, T1 and its
    /// Priority and Effort definitions; requirement r1 has Priority=[Low]
    /// and Effort=3.
    fn model() -> Model {
        let mut model = Model::new();
        let insert = |model: &mut Model, parent: &str, element: Element| {
            model.insert(Some(&id(parent)), element).expect("insert");
        };
        model
            .insert(None, Element::with_uuid("m", ElementData::Module))
            .expect("m");
        insert(
            &mut model,
            "m",
            Element::with_uuid("tf", ElementData::TypesFolder).identifier("-2"),
        );
        insert(
            &mut model,
            "tf",
            Element::with_uuid("dt", ElementData::DataTypeDefinition)
                .identifier("Priority")
                .long_name("Priority"),
        );
        insert(&mut model, "dt", Element::with_uuid("low", ElementData::EnumValue).long_name("Low"));
        insert(&mut model, "dt", Element::with_uuid("high", ElementData::EnumValue).long_name("High"));
        insert(
            &mut model,
            "tf",
            Element::with_uuid("t1", ElementData::RequirementType).identifier("T1"),
        );
        insert(
            &mut model,
            "t1",
            Element::with_uuid(
                "def-prio",
                ElementData::AttributeDefinitionEnumeration {
                    data_type: Some(id("dt")),
                    multi_valued: false,
                },
            )
            .identifier("Priority T1")
            .long_name("Priority"),
        );
        insert(
            &mut model,
            "t1",
            Element::with_uuid("def-effort", ElementData::AttributeDefinition)
                .identifier("Effort T1")
                .long_name("Effort"),
        );
        insert(
            &mut model,
            "m",
            Element::with_uuid("r1", ElementData::Requirement { type_ref: Some(id("t1")) })
                .identifier("REQ-1"),
        );
        insert(
            &mut model,
            "r1",
            Element::with_uuid(
                "v-prio",
                ElementData::AttributeValue {
                    kind: FieldKind::Enum,
                    definition: Some(id("def-prio")),
                    value: None,
                    values: vec![id("low")],
                },
            ),
        );
        insert(
            &mut model,
            "r1",
            Element::with_uuid(
                "v-effort",
                ElementData::AttributeValue {
                    kind: FieldKind::Integer,
                    definition: Some(id("def-effort")),
                    value: Some(FieldValue::Integer(3)),
                    values: vec![],
                },
            ),
        );
        model
    }

    fn with_context<R>(f: impl FnOnce(&mut TrackerContext<'_, '_>, &Model) -> R) -> R {
        let model = model();
        let tracker = tracker();
        let finder = Finder::new(&model);
        let module = model.get(&id("m")).expect("module");
        let types_folder = model.get(&id("tf"));
        let mut ctx = TrackerContext::new(finder, &tracker, "M", module, types_folder, true);
        f(&mut ctx, &model)
    }

    #[test]
    fn create_enum_value_references_existing_option() {
        with_context(|ctx, _| {
            let value = create_value(ctx, "Priority", &FieldValue::from(vec!["High"]), "T1")
                .expect("valid");
            assert_eq!(value.kind, FieldKind::Enum);
            assert_eq!(value.definition, Ref::existing(&id("def-prio")));
            assert_eq!(value.values, vec![Ref::existing(&id("high"))]);
            assert!(value.value.is_none());
        });
    }

    #[test]
    fn missing_definition_is_promised() {
        with_context(|ctx, _| {
            let value =
                create_value(ctx, "Note", &FieldValue::from("hello"), "T1").expect("valid");
            assert_eq!(value.definition, Ref::promise("AttributeDefinition Note T1"));
            assert_eq!(value.value, Some(FieldValue::from("hello")));
        });
    }

    #[test]
    fn faulty_promise_is_reported() {
        with_context(|ctx, _| {
            ctx.faulty_promises
                .insert("AttributeDefinition Note T1".to_string());
            let err = create_value(ctx, "Note", &FieldValue::from("x"), "T1").unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid field found: No AttributeDefinition 'Note' promised."
            );
        });
    }

    #[rstest]
    #[case("Priority", FieldValue::from(vec!["Unknown"]), "Invalid field found: values ['Unknown'] for 'Priority'")]
    #[case("Priority", FieldValue::from("High"), "Invalid field found: values 'High' for 'Priority'")]
    #[case("Effort", FieldValue::from("three"), "Invalid field found: value 'three' for 'Effort'")]
    #[case("Done", FieldValue::Integer(1), "Invalid field found: value 1 for 'Done'")]
    #[case("Due", FieldValue::from("yesterday"), "Invalid field found: value 'yesterday' for 'Due'")]
    #[case("Note", FieldValue::Null, "Invalid field found: value None for 'Note'")]
    fn invalid_values_are_rejected(
        #[case] name: &str,
        #[case] value: FieldValue,
        #[case] message: &str,
    ) {
        with_context(|ctx, _| {
            let err = create_value(ctx, name, &value, "T1").unwrap_err();
            assert!(matches!(err, ItemError::InvalidFieldValue(_)));
            assert_eq!(err.to_string(), message);
        });
    }

    #[rstest]
    #[case("Due", FieldValue::from("2024-03-01"))]
    #[case("Due", FieldValue::from("2024-03-01T10:00:00+02:00"))]
    #[case("Score", FieldValue::Float(0.5))]
    #[case("Done", FieldValue::Boolean(false))]
    fn valid_scalars_are_accepted(#[case] name: &str, #[case] value: FieldValue) {
        with_context(|ctx, _| {
            assert!(create_value(ctx, name, &value, "T1").is_ok());
        });
    }

    #[test]
    fn unchanged_values_yield_no_action() {
        with_context(|ctx, model| {
            let owner = model.get(&id("r1")).expect("r1");
            let decision =
                reconcile_value(ctx, owner, "Priority", &FieldValue::from(vec!["Low"]), "T1")
                    .expect("valid");
            assert!(matches!(decision, AttributeDecision::Unchanged));
            let decision = reconcile_value(ctx, owner, "Effort", &FieldValue::Integer(3), "T1")
                .expect("valid");
            assert!(matches!(decision, AttributeDecision::Unchanged));
        });
    }

    #[test]
    fn changed_enum_modifies_values() {
        with_context(|ctx, model| {
            let owner = model.get(&id("r1")).expect("r1");
            let decision = reconcile_value(
                ctx,
                owner,
                "Priority",
                &FieldValue::from(vec!["Low", "High"]),
                "T1",
            )
            .expect("valid");
            let AttributeDecision::Modify(action) = decision else {
                panic!("expected modify, got {decision:?}");
            };
            assert_eq!(action.parent, Ref::existing(&id("v-prio")));
            assert_eq!(
                action.modify[&Field::Values],
                FieldChange::Refs(vec![Ref::existing(&id("low")), Ref::existing(&id("high"))])
            );
        });
    }

    #[test]
    fn changed_scalar_modifies_value() {
        with_context(|ctx, model| {
            let owner = model.get(&id("r1")).expect("r1");
            let decision = reconcile_value(ctx, owner, "Effort", &FieldValue::Integer(5), "T1")
                .expect("valid");
            let AttributeDecision::Modify(action) = decision else {
                panic!("expected modify, got {decision:?}");
            };
            assert_eq!(
                action.modify[&Field::Value],
                FieldChange::Value(FieldValue::Integer(5))
            );
        });
    }

    #[test]
    fn absent_value_on_owner_is_created() {
        with_context(|ctx, model| {
            let owner = model.get(&id("r1")).expect("r1");
            let decision = reconcile_value(ctx, owner, "Note", &FieldValue::from("n"), "T1")
                .expect("valid");
            assert!(matches!(decision, AttributeDecision::Create(_)));
        });
    }

    #[test]
    fn legacy_folder_marker_is_skipped() {
        with_context(|ctx, _| {
            let item = WorkItem::requirement("REQ-1", "r").with_type("T1");
            let flow = check_attribute(ctx, &item, "Type", &FieldValue::from("Folder"));
            assert_eq!(flow, Flow::Skip);
            assert_eq!(ctx.error_count(), 0);
        });
    }

    #[test]
    fn missing_type_stops_attribute_loop() {
        with_context(|ctx, _| {
            let item = WorkItem::requirement("REQ-1", "r");
            let flow = check_attribute(ctx, &item, "Priority", &FieldValue::from(vec!["Low"]));
            assert_eq!(flow, Flow::Stop);
            assert_eq!(ctx.error_count(), 1);
            assert_eq!(
                ctx.errors(),
                ["M: Invalid workitem 'REQ-1'. Missing type but attributes found"]
            );
        });
    }
}
