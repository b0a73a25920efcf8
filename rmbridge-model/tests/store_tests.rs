//! Model persistence: error messages and apply → save → load.

use std::fs;

use rmbridge_core::{Action, Collection, Extension, NewElement, NewWorkItem, ObjectId, Ref};
use rmbridge_model::{
    apply,
    store::{load_model_at, save_model_at},
    Element, ElementData, ElementKind, Model, ModelError, ModelQuery,
};
use rstest::rstest;
use tempfile::TempDir;

const MODEL: &str = r#"
elements:
  - uuid: m
    identifier: "25093"
    long_name: Example module
    data:
      type: Module
  - uuid: f1
    parent: m
    identifier: F-1
    long_name: Functional
    data:
      type: Folder
  - uuid: r1
    parent: f1
    identifier: REQ-1
    long_name: Brakes
    text: <p>stop</p>
    data:
      type: Requirement
"#;

#[test]
fn load_missing_model_returns_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let err = load_model_at(&dir.path().join("model.yaml")).unwrap_err();
    assert!(matches!(err, ModelError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("model.yaml"));
}

#[rstest]
#[case(": : corrupt : yaml : !!!\n  - broken: [unclosed")]
#[case("elements:\n  - uuid: x\n    data:\n      type: Spaceship\n")]
#[case("elements:\n  - uuid: x\n    parent: ghost\n    data:\n      type: Folder\n")]
fn malformed_model_returns_parse_error_with_path(#[case] contents: &str) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("model.yaml");
    fs::write(&path, contents).expect("write");

    let err = load_model_at(&path).unwrap_err();
    assert!(matches!(err, ModelError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("model.yaml"), "got: {err}");
}

#[test]
fn load_rebuilds_child_order() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("model.yaml");
    fs::write(&path, MODEL).expect("write");

    let model = load_model_at(&path).expect("load");
    let items: Vec<&str> = model
        .search(&ElementKind::WORK_ITEMS, Some(&ObjectId::from("m")))
        .iter()
        .map(|e| e.identifier.as_str())
        .collect();
    assert_eq!(items, vec!["F-1", "REQ-1"]);
    assert_eq!(
        model.get(&ObjectId::from("r1")).expect("r1").text.as_deref(),
        Some("<p>stop</p>")
    );
}

#[test]
fn applied_changes_survive_save_and_load() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("model.yaml");

    let mut model = Model::new();
    let m = model
        .insert(None, Element::with_uuid("m", ElementData::Module))
        .expect("m");

    let mut action = Action::new(Ref::existing(&m));
    action.push_extend(
        Collection::Folders,
        Extension::Create(NewElement::WorkItem(NewWorkItem {
            long_name: "Functional".into(),
            identifier: "F-1".into(),
            text: None,
            type_ref: None,
            attributes: vec![],
            requirements: vec![],
            folders: vec![],
        })),
    );
    apply(&mut model, &[action]).expect("apply");

    save_model_at(&path, &model).expect("save");
    let loaded = load_model_at(&path).expect("load");
    let folders = loaded.children(&m, ElementKind::Folder);
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].identifier, "F-1");
}
