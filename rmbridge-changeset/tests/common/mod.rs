#![allow(dead_code)]

use rmbridge_changeset::{calculate_change_set, ChangeSet, ChangeSetOptions, Policy};
use rmbridge_core::{Action, ObjectId, Ref, TrackerConfig, TrackerSnapshot};
use rmbridge_model::{store::from_yaml_str, Model};

/// Module `m` with a types folder, folders F (R1, R2) and G.
pub const MODEL: &str = r#"
elements:
  - uuid: m
    identifier: M
    long_name: Module
    data: {type: Module}
  - uuid: tf
    parent: m
    identifier: "-2"
    long_name: Types
    data: {type: TypesFolder}
  - uuid: dt-prio
    parent: tf
    identifier: Priority
    long_name: Priority
    data: {type: DataTypeDefinition}
  - uuid: ev-low
    parent: dt-prio
    long_name: Low
    data: {type: EnumValue}
  - uuid: ev-high
    parent: dt-prio
    long_name: High
    data: {type: EnumValue}
  - uuid: t1
    parent: tf
    identifier: T1
    long_name: System Requirement
    data: {type: RequirementType}
  - uuid: ad-prio-t1
    parent: t1
    identifier: Priority T1
    long_name: Priority
    data: {type: AttributeDefinitionEnumeration, data_type: dt-prio}
  - uuid: ad-note-t1
    parent: t1
    identifier: Note T1
    long_name: Note
    data: {type: AttributeDefinition}
  - uuid: t2
    parent: tf
    identifier: T2
    long_name: User Requirement
    data: {type: RequirementType}
  - uuid: ad-note-t2
    parent: t2
    identifier: Note T2
    long_name: Note
    data: {type: AttributeDefinition}
  - uuid: f
    parent: m
    identifier: F
    long_name: Folder
    data: {type: Folder}
  - uuid: r1
    parent: f
    identifier: R1
    long_name: One
    text: <p>one</p>
    data: {type: Requirement, requirement_type: t1}
  - uuid: av-r1-prio
    parent: r1
    data: {type: AttributeValue, kind: Enum, definition: ad-prio-t1, values: [ev-low]}
  - uuid: av-r1-note
    parent: r1
    data: {type: AttributeValue, kind: String, definition: ad-note-t1, value: n1}
  - uuid: r2
    parent: f
    identifier: R2
    long_name: Two
    data: {type: Requirement, requirement_type: t1}
  - uuid: g
    parent: m
    identifier: G
    long_name: Other
    data: {type: Folder}
"#;

/// The snapshot [`MODEL`] is already in sync with.
pub const SNAPSHOT: &str = r#"
id: M
long_name: Module
data_types:
  Priority: [Low, High]
requirement_types:
  T1:
    long_name: System Requirement
    attributes:
      Priority: {type: Enum}
      Note: {type: String}
  T2:
    long_name: User Requirement
    attributes:
      Note: {type: String}
items:
  - id: F
    long_name: Folder
    children:
      - id: R1
        long_name: One
        type: T1
        text: <p>one</p>
        attributes:
          Priority: [Low]
          Note: n1
      - id: R2
        long_name: Two
        type: T1
  - id: G
    long_name: Other
    children: []
"#;

pub fn model() -> Model {
    from_yaml_str(MODEL).expect("fixture model")
}

/// A model holding nothing but module `m`.
pub fn empty_module() -> Model {
    from_yaml_str("elements:\n  - uuid: m\n    data: {type: Module}\n").expect("empty module")
}

pub fn tracker(yaml: &str) -> TrackerSnapshot {
    serde_yaml::from_str(yaml).expect("fixture snapshot")
}

pub fn compile(model: &Model, yaml: &str) -> ChangeSet {
    compile_with(model, yaml, Policy::Safe)
}

pub fn compile_with(model: &Model, yaml: &str, policy: Policy) -> ChangeSet {
    calculate_change_set(
        model,
        &TrackerConfig::for_module("m"),
        &tracker(yaml),
        ChangeSetOptions {
            policy,
            ..ChangeSetOptions::default()
        },
    )
}

pub fn uuid(id: &str) -> Ref {
    Ref::existing(&ObjectId::from(id))
}

/// The action addressed to `id`.
pub fn action_for<'a>(actions: &'a [Action], id: &str) -> Option<&'a Action> {
    let target = uuid(id);
    actions.iter().find(|action| action.parent == target)
}
