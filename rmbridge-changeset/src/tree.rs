//! Tree Reconciler: module content (folders, requirements and their
//! attribute values).
//!
//! Snapshot items are matched to model objects by identifier over the whole
//! model. Unmatched items become nested create descriptors; matched ones get
//! a flat modify action plus the actions of their descendants. An object
//! whose parent differs from the snapshot is moved by reference and its
//! identifier is recorded so the old parent does not delete it.

use std::collections::HashSet;

use rmbridge_core::{
    Action, ChildEntry, Collection, Extension, Field, FieldChange, ItemKind, NewAttributeValue,
    NewElement, NewWorkItem, ObjectId, Ref, WorkItem,
};
use rmbridge_model::{repair_html, Element, ElementKind};

use crate::attribute::{
    check_attribute, create_value, reconcile_value, unknown_type, AttributeDecision, Flow,
};
use crate::context::TrackerContext;
use crate::error::ItemError;

/// Parent a matched object should end up under.
#[derive(Clone, Copy)]
enum Expected<'a> {
    Existing(&'a ObjectId),
    /// A folder created in this change set; everything below it moves.
    New,
}

/// Result of reconciling one list of snapshot children.
#[derive(Default)]
struct Children {
    requirements: Vec<ChildEntry>,
    folders: Vec<ChildEntry>,
    requirement_ids: HashSet<String>,
    folder_ids: HashSet<String>,
    actions: Vec<Action>,
}

impl Children {
    fn slot(&mut self, kind: ItemKind) -> &mut Vec<ChildEntry> {
        match kind {
            ItemKind::Folder => &mut self.folders,
            ItemKind::Requirement => &mut self.requirements,
        }
    }

    fn ids(&mut self, kind: ItemKind) -> &mut HashSet<String> {
        match kind {
            ItemKind::Folder => &mut self.folder_ids,
            ItemKind::Requirement => &mut self.requirement_ids,
        }
    }

    /// Child slots as `extend` entries of an existing parent.
    fn push_extensions(&mut self, action: &mut Action) {
        for entry in self.requirements.drain(..) {
            action.push_extend(Collection::Requirements, into_extension(entry));
        }
        for entry in self.folders.drain(..) {
            action.push_extend(Collection::Folders, into_extension(entry));
        }
    }
}

fn into_extension(entry: ChildEntry) -> Extension {
    match entry {
        ChildEntry::Create(item) => Extension::Create(NewElement::WorkItem(*item)),
        ChildEntry::Existing(r) => Extension::Reference(r),
    }
}

struct Modified {
    actions: Vec<Action>,
    moved: bool,
}

struct TreeWalk<'c, 'm, 's> {
    ctx: &'c mut TrackerContext<'m, 's>,
    /// Identifiers of matched objects whose parent changes in this run.
    location_changed: HashSet<String>,
    moved: HashSet<ObjectId>,
}

/// Reconcile the module's content.
///
/// Top-level creations, moves and deletions go into `module_action`; every
/// other action is returned in tree order (an object's own action, its
/// attribute value modifications, then its descendants).
pub(crate) fn reconcile_tree(
    ctx: &mut TrackerContext<'_, '_>,
    module_action: &mut Action,
) -> Vec<Action> {
    let tracker = ctx.tracker;
    let module = ctx.module;

    let mut walk = TreeWalk {
        ctx,
        location_changed: HashSet::new(),
        moved: HashSet::new(),
    };
    let mut children = walk.reconcile_children(&tracker.items, Expected::Existing(&module.uuid));
    children.push_extensions(module_action);
    walk.push_child_deletions(module_action, module, &children);

    let moved = walk.moved;
    let keep = |collection: Collection, target: &Ref| match collection {
        Collection::Requirements | Collection::Folders => target
            .as_existing()
            .map_or(true, |uuid| !moved.contains(uuid)),
        _ => true,
    };
    module_action.retain_deletions(keep);
    let mut actions = children.actions;
    for action in &mut actions {
        action.retain_deletions(keep);
    }
    actions.retain(|action| !action.is_empty());
    actions
}

impl<'c, 'm, 's> TreeWalk<'c, 'm, 's> {
    fn reconcile_children(&mut self, items: &'s [WorkItem], expected: Expected<'_>) -> Children {
        let mut children = Children::default();
        for item in items {
            let kind = item.kind();
            // Visited even when the item fails below, so it is not deleted.
            children.ids(kind).insert(item.id.0.clone());

            match self.ctx.finder.work_item(kind, item.id.as_str()) {
                Err(e) => self
                    .ctx
                    .report(format!("Invalid workitem '{}'. {e}", item.id)),
                Ok(None) => {
                    let (created, actions) = self.create_item(item);
                    if let Some(created) = created {
                        children.slot(kind).push(ChildEntry::Create(Box::new(created)));
                    }
                    children.actions.extend(actions);
                }
                Ok(Some(existing)) => match self.modify_item(item, existing, expected) {
                    Ok(modified) => {
                        if modified.moved {
                            children
                                .slot(kind)
                                .push(ChildEntry::Existing(Ref::existing(&existing.uuid)));
                        }
                        children.actions.extend(modified.actions);
                    }
                    Err(e) => self
                        .ctx
                        .report(format!("Invalid workitem '{}'. {e}", item.id)),
                },
            }
        }
        children
    }

    /// Deletes existing children of `parent` that the snapshot no longer
    /// lists below it.
    fn push_child_deletions(&self, action: &mut Action, parent: &Element, children: &Children) {
        let model = self.ctx.model();
        let kinds = [
            (ElementKind::Requirement, Collection::Requirements, &children.requirement_ids),
            (ElementKind::Folder, Collection::Folders, &children.folder_ids),
        ];
        for (kind, collection, visited) in kinds {
            for child in model.children(&parent.uuid, kind) {
                if !visited.contains(&child.identifier)
                    && !self.location_changed.contains(&child.identifier)
                {
                    action.push_delete(collection, Ref::existing(&child.uuid));
                }
            }
        }
    }

    fn type_ref(&self, type_id: &str) -> Result<Ref, ItemError> {
        Ok(match self.ctx.requirement_type(type_id)? {
            Some(rt) => Ref::existing(&rt.uuid),
            None => Ref::promise(format!("RequirementType {type_id}")),
        })
    }

    fn check_type(&self, item: &WorkItem) -> Result<(), ItemError> {
        match item.declared_type() {
            Some(type_id) if !self.ctx.tracker.requirement_types.contains_key(type_id) => {
                Err(unknown_type(type_id))
            }
            _ => Ok(()),
        }
    }

    /// Create descriptors for every valid attribute of `item`.
    fn created_attributes(&mut self, item: &WorkItem) -> Vec<NewAttributeValue> {
        let mut created = Vec::new();
        for (name, value) in &item.attributes {
            match check_attribute(self.ctx, item, name, value) {
                Flow::Stop => break,
                Flow::Skip => continue,
                Flow::Proceed => {}
            }
            let Some(type_id) = item.declared_type() else {
                break;
            };
            match create_value(self.ctx, name, value, type_id) {
                Ok(attribute) => created.push(attribute),
                Err(e) => self
                    .ctx
                    .report(format!("Invalid workitem '{}'. {e}", item.id)),
            }
        }
        created
    }

    /// Create branch. The descriptor is `None` when the item itself is
    /// invalid; actions for already existing descendants are kept.
    fn create_item(&mut self, item: &'s WorkItem) -> (Option<NewWorkItem>, Vec<Action>) {
        let errors_before = self.ctx.error_count();
        let type_ref = self.check_type(item).and_then(|()| {
            item.declared_type()
                .map(|type_id| self.type_ref(type_id))
                .transpose()
        });
        let type_ref = match type_ref {
            Ok(type_ref) => type_ref,
            Err(e) => {
                self.ctx
                    .report(format!("Invalid workitem '{}'. {e}", item.id));
                return (None, Vec::new());
            }
        };
        let attributes = self.created_attributes(item);
        let failed = self.ctx.error_count() > errors_before;

        let mut created = NewWorkItem {
            long_name: item.long_name.clone().unwrap_or_default(),
            identifier: item.id.0.clone(),
            text: item.text.as_deref().map(repair_html),
            type_ref,
            attributes,
            requirements: Vec::new(),
            folders: Vec::new(),
        };

        let mut actions = Vec::new();
        if item.kind() == ItemKind::Folder {
            let children = self.reconcile_children(item.children(), Expected::New);
            created.requirements = children.requirements;
            created.folders = children.folders;
            actions = children.actions;
        }

        ((!failed).then_some(created), actions)
    }

    /// Modify branch for an item matched to `existing`.
    fn modify_item(
        &mut self,
        item: &'s WorkItem,
        existing: &'m Element,
        expected: Expected<'_>,
    ) -> Result<Modified, ItemError> {
        // Recorded before any check can fail: the old parent must keep an
        // item whose own changes are rejected.
        let moved = match expected {
            Expected::Existing(parent) => existing.parent.as_ref() != Some(parent),
            Expected::New => true,
        };
        if moved {
            self.location_changed.insert(existing.identifier.clone());
            self.moved.insert(existing.uuid.clone());
        }
        self.check_type(item)?;
        let errors_before = self.ctx.error_count();
        let model = self.ctx.model();

        let mut action = Action::new(Ref::existing(&existing.uuid));
        if let Some(long_name) = &item.long_name {
            if existing.long_name != *long_name {
                action.set(Field::LongName, FieldChange::text(long_name));
            }
        }
        if let Some(text) = &item.text {
            let repaired = repair_html(text);
            if existing.text.as_deref().map(repair_html).as_deref() != Some(repaired.as_str()) {
                action.set(Field::Text, FieldChange::text(repaired));
            }
        }

        let wanted_type = item
            .declared_type()
            .map(|type_id| self.type_ref(type_id))
            .transpose()?;
        let type_changed = match (&wanted_type, existing.type_ref()) {
            (Some(Ref::Existing(wanted)), Some(current)) => wanted != current,
            (None, None) => false,
            _ => true,
        };

        let current_values = model.children(&existing.uuid, ElementKind::AttributeValue);
        let mut attribute_mods = Vec::new();
        if type_changed {
            action.set(
                Field::Type,
                wanted_type.map_or(FieldChange::Unset, FieldChange::Ref),
            );
            for value in &current_values {
                action.push_delete(Collection::Attributes, Ref::existing(&value.uuid));
            }
            for created in self.created_attributes(item) {
                action.push_extend(
                    Collection::Attributes,
                    Extension::Create(NewElement::AttributeValue(created)),
                );
            }
        } else {
            for (name, value) in &item.attributes {
                match check_attribute(self.ctx, item, name, value) {
                    Flow::Stop => break,
                    Flow::Skip => continue,
                    Flow::Proceed => {}
                }
                let Some(type_id) = item.declared_type() else {
                    break;
                };
                match reconcile_value(self.ctx, existing, name, value, type_id) {
                    Ok(AttributeDecision::Create(created)) => action.push_extend(
                        Collection::Attributes,
                        Extension::Create(NewElement::AttributeValue(created)),
                    ),
                    Ok(AttributeDecision::Modify(modified)) => attribute_mods.push(modified),
                    Ok(AttributeDecision::Unchanged) => {}
                    Err(e) => self
                        .ctx
                        .report(format!("Invalid workitem '{}'. {e}", item.id)),
                }
            }
            // Values of undeclared or replaced definitions go away.
            for value in &current_values {
                let defined = value
                    .definition()
                    .filter(|uuid| !self.ctx.dropped_definitions.contains(*uuid))
                    .and_then(|uuid| model.get(uuid))
                    .is_some_and(|def| item.attributes.contains_key(&def.long_name));
                if !defined {
                    action.push_delete(Collection::Attributes, Ref::existing(&value.uuid));
                }
            }
        }
        let failed = self.ctx.error_count() > errors_before;

        let mut descendants = Vec::new();
        if item.kind() == ItemKind::Folder {
            let mut children =
                self.reconcile_children(item.children(), Expected::Existing(&existing.uuid));
            children.push_extensions(&mut action);
            self.push_child_deletions(&mut action, existing, &children);
            descendants = children.actions;
        }

        let mut actions = Vec::with_capacity(attribute_mods.len() + descendants.len() + 1);
        if !failed {
            if !action.is_empty() {
                actions.push(action);
            }
            actions.extend(attribute_mods);
        }
        actions.extend(descendants);
        Ok(Modified { actions, moved })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TYPES_FOLDER_IDENTIFIER;
    use crate::find::Finder;
    use rmbridge_core::{FieldValue, TrackerSnapshot};
    use rmbridge_model::{ElementData, Model, ModelQuery};

    fn id(s: &str) -> ObjectId {
        ObjectId::from(s)
    }

    fn model() -> Model {
        let mut model = Model::new();
        let mut insert = |parent: Option<&str>, element: Element| {
            model
                .insert(parent.map(id).as_ref(), element)
                .expect("insert");
        };
        insert(None, Element::with_uuid("m", ElementData::Module).identifier("M"));
        insert(
            Some("m"),
            Element::with_uuid("tf", ElementData::TypesFolder).identifier("-2"),
        );
        insert(
            Some("tf"),
            Element::with_uuid("t1", ElementData::RequirementType).identifier("T1"),
        );
        insert(
            Some("t1"),
            Element::with_uuid("def-note", ElementData::AttributeDefinition)
                .identifier("Note T1")
                .long_name("Note"),
        );
        insert(
            Some("m"),
            Element::with_uuid("fa", ElementData::Folder { type_ref: None })
                .identifier("FA")
                .long_name("A"),
        );
        insert(
            Some("fa"),
            Element::with_uuid("r1", ElementData::Requirement { type_ref: Some(id("t1")) })
                .identifier("R1")
                .long_name("One"),
        );
        insert(
            Some("r1"),
            Element::with_uuid(
                "v-note",
                ElementData::AttributeValue {
                    kind: rmbridge_core::FieldKind::String,
                    definition: Some(id("def-note")),
                    value: Some(FieldValue::from("n")),
                    values: Vec::new(),
                },
            ),
        );
        insert(
            Some("fa"),
            Element::with_uuid("r2", ElementData::Requirement { type_ref: None })
                .identifier("R2")
                .long_name("Two"),
        );
        insert(
            Some("m"),
            Element::with_uuid("fb", ElementData::Folder { type_ref: None })
                .identifier("FB")
                .long_name("B"),
        );
        model
    }

    const TRACKER: &str = r#"
id: M
requirement_types:
  T1:
    long_name: T1
    attributes:
      Note: {type: String}
items:
  - id: FA
    long_name: A
    children:
      - id: R1
        long_name: One
        type: T1
        attributes:
          Note: n
      - id: R2
        long_name: Two
  - id: FB
    long_name: B
    children: []
"#;

    fn run(model: &Model, yaml: &str) -> (Action, Vec<Action>, Vec<String>) {
        let tracker: TrackerSnapshot = serde_yaml::from_str(yaml).expect("tracker");
        let finder = Finder::new(model);
        let module = model.get(&id("m")).expect("module");
        let tf = finder
            .types_folder(TYPES_FOLDER_IDENTIFIER, &module.uuid)
            .expect("lookup");
        let mut ctx = TrackerContext::new(finder, &tracker, "M", module, tf, true);
        let mut module_action = Action::new(Ref::existing(&module.uuid));
        let actions = reconcile_tree(&mut ctx, &mut module_action);
        (module_action, actions, ctx.into_errors().0)
    }

    #[test]
    fn unchanged_tree_yields_nothing() {
        let model = model();
        let (module_action, actions, errors) = run(&model, TRACKER);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(module_action.is_empty(), "{module_action:?}");
        assert!(actions.is_empty(), "{actions:?}");
    }

    #[test]
    fn moved_requirement_is_referenced_not_deleted() {
        let model = model();
        let yaml = TRACKER.replace(
            "      - id: R2\n        long_name: Two\n  - id: FB\n    long_name: B\n    children: []\n",
            "  - id: FB\n    long_name: B\n    children:\n      - id: R2\n        long_name: Two\n",
        );
        let (_, actions, errors) = run(&model, &yaml);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(actions.len(), 1, "{actions:?}");
        let fb = &actions[0];
        assert_eq!(fb.parent, Ref::existing(&id("fb")));
        assert_eq!(
            fb.extensions(Collection::Requirements),
            &[Extension::Reference(Ref::existing(&id("r2")))]
        );
        assert!(actions
            .iter()
            .all(|a| a.deletions(Collection::Requirements).is_empty()));
    }

    #[test]
    fn move_into_an_earlier_sibling_invalidates_the_staged_deletion() {
        let model = model();
        // FB is walked first and claims R2 before FA computes its deletions.
        let yaml = r#"
id: M
requirement_types:
  T1: {long_name: T1, attributes: {Note: {type: String}}}
items:
  - id: FB
    long_name: B
    children:
      - id: R2
        long_name: Two
  - id: FA
    long_name: A
    children:
      - id: R1
        long_name: One
        type: T1
        attributes: {Note: n}
"#;
        let (_, actions, errors) = run(&model, yaml);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(actions.len(), 1, "{actions:?}");
        assert!(actions[0].deletions(Collection::Requirements).is_empty());
    }

    #[test]
    fn removed_child_is_deleted_from_its_folder() {
        let model = model();
        let yaml = TRACKER.replace("      - id: R2\n        long_name: Two\n", "");
        let (_, actions, _) = run(&model, &yaml);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].parent, Ref::existing(&id("fa")));
        assert_eq!(
            actions[0].deletions(Collection::Requirements),
            &[Ref::existing(&id("r2"))]
        );
    }

    #[test]
    fn new_folder_nests_new_and_moved_children() {
        let model = model();
        let yaml = format!(
            "{TRACKER}  - id: FC\n    long_name: C\n    children:\n      - id: R3\n        long_name: Three\n        text: \"a<br>b\"\n      - id: R2\n        long_name: Two\n"
        )
        .replace("      - id: R2\n        long_name: Two\n  - id: FB", "  - id: FB");
        let (module_action, actions, errors) = run(&model, &yaml);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(actions.is_empty(), "{actions:?}");

        let created = module_action.extensions(Collection::Folders)[0]
            .as_new()
            .and_then(NewElement::as_work_item)
            .expect("new folder");
        assert_eq!(created.identifier, "FC");
        let r3 = created.requirements[0].as_new().expect("new requirement");
        assert_eq!(r3.text.as_deref(), Some("a<br />b"));
        assert_eq!(
            created.requirements[1],
            ChildEntry::Existing(Ref::existing(&id("r2")))
        );
        assert!(module_action.delete.is_empty());
    }

    #[test]
    fn type_change_rebuilds_all_attributes() {
        let model = model();
        let yaml = TRACKER
            .replace(
                "requirement_types:\n",
                "requirement_types:\n  T2:\n    long_name: T2\n    attributes:\n      Note: {type: String}\n",
            )
            .replace("        type: T1\n", "        type: T2\n");
        let (_, actions, errors) = run(&model, &yaml);
        assert!(errors.is_empty(), "{errors:?}");
        let r1 = &actions[0];
        assert_eq!(r1.parent, Ref::existing(&id("r1")));
        assert_eq!(
            r1.modify[&Field::Type],
            FieldChange::Ref(Ref::promise("RequirementType T2"))
        );
        assert_eq!(
            r1.deletions(Collection::Attributes),
            &[Ref::existing(&id("v-note"))]
        );
        let created = r1.extensions(Collection::Attributes)[0]
            .as_new()
            .and_then(NewElement::as_attribute_value)
            .expect("attribute");
        assert_eq!(created.definition, Ref::promise("AttributeDefinition Note T2"));
    }

    #[test]
    fn unknown_type_is_reported_and_item_kept() {
        let model = model();
        let yaml = TRACKER.replace("        type: T1\n", "        type: T7\n");
        let (_, actions, errors) = run(&model, &yaml);
        assert_eq!(
            errors,
            vec![
                "M: Invalid workitem 'R1'. Faulty workitem in snapshot: Unknown workitem-type 'T7'"
            ]
        );
        assert!(actions
            .iter()
            .all(|a| a.deletions(Collection::Requirements).is_empty()));
    }

    #[test]
    fn moved_item_with_unknown_type_stays_at_its_old_parent() {
        let model = model();
        let yaml = TRACKER.replace(
            "      - id: R2\n        long_name: Two\n  - id: FB\n    long_name: B\n    children: []\n",
            "  - id: FB\n    long_name: B\n    children:\n      - id: R2\n        long_name: Two\n        type: T9\n",
        );
        let (module_action, actions, errors) = run(&model, &yaml);
        assert_eq!(
            errors,
            vec![
                "M: Invalid workitem 'R2'. Faulty workitem in snapshot: Unknown workitem-type 'T9'"
            ]
        );
        let r2 = Ref::existing(&id("r2"));
        for action in actions.iter().chain([&module_action]) {
            assert!(
                !action.deletions(Collection::Requirements).contains(&r2),
                "{action:?}"
            );
            assert!(
                !action
                    .extensions(Collection::Requirements)
                    .contains(&Extension::Reference(r2.clone())),
                "{action:?}"
            );
        }
    }
}
