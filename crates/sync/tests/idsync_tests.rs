//! Integration tests for identity synchronization
//!
//! These tests drive whole schema evolutions through the metadata file:
//! - first sync of a new model, then a no-op re-sync
//! - adding, removing and renaming entities and properties
//! - index identity assignment
//! - error paths leaving both model and file untouched

use ironbox_core::{
    EntityBuilder, EntityDescriptor, Error, HnswParams, IdUid, IndexKind, Model, PropertyBuilder,
    ValueKind,
};
use ironbox_sync::{sync_model, IdSync, ModelFile, MODEL_PARSER_VERSION};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn model_path(dir: &TempDir) -> PathBuf {
    dir.path().join("ironbox-model.json")
}

fn entity(name: &str, props: &[(&str, ValueKind)]) -> EntityDescriptor {
    let mut builder = EntityBuilder::new(name).property(PropertyBuilder::id("id"));
    for (prop, kind) in props {
        builder = builder.property(PropertyBuilder::new(*prop, *kind));
    }
    builder.build().unwrap()
}

fn model(entities: Vec<EntityDescriptor>) -> Model {
    let mut model = Model::new();
    for e in entities {
        model.add_entity(e).unwrap();
    }
    model
}

fn read_file(path: &Path) -> ModelFile {
    ModelFile::parse(&std::fs::read_to_string(path).unwrap(), "test").unwrap()
}

fn task_model() -> Model {
    let task = EntityBuilder::new("Task")
        .property(PropertyBuilder::id("id"))
        .property(PropertyBuilder::new("text", ValueKind::String).index(IndexKind::Hash))
        .property(PropertyBuilder::new("date_created", ValueKind::Date))
        .property(PropertyBuilder::new("date_finished", ValueKind::Date))
        .build()
        .unwrap();
    model(vec![task])
}

#[test]
fn test_first_sync_then_noop() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut first = task_model();
    assert!(sync_model(&mut first, &path).unwrap());
    let written = std::fs::read_to_string(&path).unwrap();

    let mut second = task_model();
    assert!(!sync_model(&mut second, &path).unwrap());
    assert_eq!(first, second);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), written);

    let task = &first.entities[0];
    let ids: Vec<u32> = task.properties.iter().map(|p| p.identity.id).collect();
    assert_eq!(ids, [1, 2, 3, 4]);
    assert_eq!(task.last_property_identity.id, 4);
    assert_eq!(task.properties[1].index.as_ref().unwrap().identity.id, 1);
    assert_eq!(first.last_index_identity.id, 1);

    let file = read_file(&path);
    assert_eq!(file.model_version_parser_minimum, MODEL_PARSER_VERSION);
    assert_eq!(file.entities.len(), 1);
    assert_eq!(file.entities[0].properties[2].kind, ValueKind::Date.code());
}

#[test]
fn test_resync_same_model_instance() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut model = task_model();
    let mut sync = IdSync::new(&path);
    assert!(sync.sync(&mut model).unwrap());
    let snapshot = model.clone();
    assert!(!sync.sync(&mut model).unwrap());
    assert_eq!(model, snapshot);
}

#[test]
fn test_entity_add() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![entity("A", &[("name", ValueKind::String)])]);
    sync_model(&mut v1, &path).unwrap();

    let mut v2 = model(vec![
        entity("A", &[("name", ValueKind::String)]),
        entity("B", &[("value", ValueKind::Int)]),
    ]);
    assert!(sync_model(&mut v2, &path).unwrap());

    assert_eq!(v2.entities[0].identity, v1.entities[0].identity);
    assert_eq!(v2.entities[1].identity.id, 2);
    assert_eq!(v2.last_entity_identity, v2.entities[1].identity);
    assert_eq!(read_file(&path).entities.len(), 2);
}

#[test]
fn test_entity_remove_keeps_counter() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![
        entity("A", &[("name", ValueKind::String)]),
        entity("B", &[("value", ValueKind::Int)]),
    ]);
    sync_model(&mut v1, &path).unwrap();
    let b = v1.entities[1].identity;

    let mut v2 = model(vec![entity("A", &[("name", ValueKind::String)])]);
    assert!(sync_model(&mut v2, &path).unwrap());
    assert_eq!(v2.last_entity_identity, b);
    let file = read_file(&path);
    assert_eq!(file.entities.len(), 1);
    assert_eq!(file.last_entity_id, b);

    // A re-added "B" is a new entity; its old ID is never reused.
    let mut v3 = model(vec![
        entity("A", &[("name", ValueKind::String)]),
        entity("B", &[("value", ValueKind::Int)]),
    ]);
    sync_model(&mut v3, &path).unwrap();
    assert_eq!(v3.entities[1].identity.id, 3);
    assert_ne!(v3.entities[1].identity.uid, b.uid);
}

#[test]
fn test_entity_rename_by_uid() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![entity("EntityA", &[("name", ValueKind::String)])]);
    sync_model(&mut v1, &path).unwrap();
    let original = v1.entities[0].clone();

    let renamed = || {
        EntityBuilder::new("EntityB")
            .uid(original.identity.uid)
            .property(PropertyBuilder::id("id"))
            .property(PropertyBuilder::new("name", ValueKind::String))
            .build()
            .unwrap()
    };
    let mut v2 = model(vec![renamed()]);
    assert!(sync_model(&mut v2, &path).unwrap());

    // the rename is written once
    let before = std::fs::read_to_string(&path).unwrap();
    let mut v3 = model(vec![renamed()]);
    assert!(!sync_model(&mut v3, &path).unwrap());
    assert_eq!(v3, v2);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

    let entity = &v2.entities[0];
    assert_eq!(entity.identity, original.identity);
    assert_eq!(entity.properties, original.properties);
    let file = read_file(&path);
    assert_eq!(file.entities[0].name, "EntityB");
    assert!(file.entity_by_name("EntityA").is_none());
}

#[test]
fn test_rename_without_uid_is_a_new_entity() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![entity("EntityA", &[])]);
    sync_model(&mut v1, &path).unwrap();

    let mut v2 = model(vec![entity("EntityB", &[])]);
    sync_model(&mut v2, &path).unwrap();
    assert_eq!(v2.entities[0].identity.id, 2);
}

#[test]
fn test_prop_add_and_remove() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![entity("A", &[("name", ValueKind::String)])]);
    sync_model(&mut v1, &path).unwrap();

    let mut v2 = model(vec![entity(
        "A",
        &[("name", ValueKind::String), ("age", ValueKind::Int)],
    )]);
    assert!(sync_model(&mut v2, &path).unwrap());
    let age = v2.entities[0].property("age").unwrap().identity;
    assert_eq!(age.id, 3);
    assert_eq!(v2.entities[0].last_property_identity, age);

    let mut v3 = model(vec![entity("A", &[("age", ValueKind::Int)])]);
    assert!(sync_model(&mut v3, &path).unwrap());
    assert_eq!(v3.entities[0].property("age").unwrap().identity, age);
    assert_eq!(v3.entities[0].last_property_identity, age);

    // "name" comes back with a new identity
    let mut v4 = model(vec![entity(
        "A",
        &[("age", ValueKind::Int), ("name", ValueKind::String)],
    )]);
    sync_model(&mut v4, &path).unwrap();
    assert_eq!(v4.entities[0].property("name").unwrap().identity.id, 4);
}

#[test]
fn test_prop_rename_by_uid() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![entity("EntityA", &[("name", ValueKind::String)])]);
    sync_model(&mut v1, &path).unwrap();
    let name = v1.entities[0].property("name").unwrap().identity;

    let renamed = || {
        EntityBuilder::new("EntityA")
            .property(PropertyBuilder::id("id"))
            .property(PropertyBuilder::new("renamed_name", ValueKind::String).uid(name.uid))
            .build()
            .unwrap()
    };
    let mut v2 = model(vec![renamed()]);
    assert!(sync_model(&mut v2, &path).unwrap());
    assert_eq!(v2.entities[0].identity, v1.entities[0].identity);
    assert_eq!(v2.entities[0].property("renamed_name").unwrap().identity, name);

    let mut v3 = model(vec![renamed()]);
    assert!(!sync_model(&mut v3, &path).unwrap());
    assert_eq!(v3, v2);
    let file = read_file(&path);
    assert_eq!(file.entities[0].properties[1].name, "renamed_name");
}

#[test]
fn test_unknown_user_uid_is_adopted() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let pinned = EntityBuilder::new("Pinned")
        .uid(1_234_567)
        .property(PropertyBuilder::id("id").uid(7_654_321))
        .build()
        .unwrap();
    let mut v1 = model(vec![pinned]);
    sync_model(&mut v1, &path).unwrap();
    assert_eq!(v1.entities[0].identity, IdUid::new(1, 1_234_567));
    assert_eq!(v1.entities[0].properties[0].identity, IdUid::new(1, 7_654_321));
}

#[test]
fn test_user_uid_taken_elsewhere() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![entity("A", &[("name", ValueKind::String)])]);
    sync_model(&mut v1, &path).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();
    let property_uid = v1.entities[0].property("name").unwrap().identity.uid;

    // New entity pinned to a UID that already belongs to a property
    let clash = EntityBuilder::new("B")
        .uid(property_uid)
        .property(PropertyBuilder::id("id"))
        .build()
        .unwrap();
    let mut v2 = model(vec![entity("A", &[("name", ValueKind::String)]), clash]);
    let snapshot = v2.clone();
    let err = sync_model(&mut v2, &path).unwrap_err();
    assert!(matches!(err, Error::DuplicateUid { uid, .. } if uid == property_uid));
    assert_eq!(v2, snapshot);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_duplicate_uid_in_file() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![entity("A", &[("name", ValueKind::String)])]);
    sync_model(&mut v1, &path).unwrap();

    let mut file = read_file(&path);
    file.entities[0].properties[1].id.uid = file.entities[0].id.uid;
    let corrupted = file.to_json().unwrap();
    std::fs::write(&path, &corrupted).unwrap();

    let mut v2 = model(vec![entity("A", &[("name", ValueKind::String)])]);
    let err = sync_model(&mut v2, &path).unwrap_err();
    assert!(matches!(err, Error::DuplicateUid { .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), corrupted);
}

#[test]
fn test_incompatible_parser_version() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);
    std::fs::write(
        &path,
        r#"{"modelVersionParserMinimum": 6, "lastEntityId": "0:0", "entities": []}"#,
    )
    .unwrap();

    let err = sync_model(&mut task_model(), &path).unwrap_err();
    assert!(matches!(
        err,
        Error::IncompatibleMetadataVersion { found: 6, supported: 5 }
    ));
}

#[test]
fn test_missing_parser_version_is_accepted() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);
    std::fs::write(&path, r#"{"lastEntityId": "0:0", "entities": []}"#).unwrap();

    let mut model = task_model();
    assert!(sync_model(&mut model, &path).unwrap());
    assert_eq!(read_file(&path).model_version_parser_minimum, MODEL_PARSER_VERSION);
}

#[test]
fn test_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);
    std::fs::write(&path, "{ not json").unwrap();

    let err = sync_model(&mut task_model(), &path).unwrap_err();
    assert!(matches!(err, Error::MetadataParse { .. }));
}

#[test]
fn test_index_identities() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let build = |with_vector: bool| {
        let mut b = EntityBuilder::new("Doc")
            .property(PropertyBuilder::id("id"))
            .property(PropertyBuilder::new("title", ValueKind::String).index(IndexKind::Value));
        if with_vector {
            b = b.property(
                PropertyBuilder::new("embedding", ValueKind::FloatVector)
                    .index(IndexKind::Hnsw(HnswParams::new(3))),
            );
        }
        model(vec![b.build().unwrap()])
    };

    let mut v1 = build(false);
    sync_model(&mut v1, &path).unwrap();
    let title_index = v1.entities[0].properties[1].index.as_ref().unwrap().identity;
    assert_eq!(title_index.id, 1);

    let mut v2 = build(true);
    sync_model(&mut v2, &path).unwrap();
    let doc = &v2.entities[0];
    assert_eq!(doc.properties[1].index.as_ref().unwrap().identity, title_index);
    let vector_index = doc.properties[2].index.as_ref().unwrap().identity;
    assert_eq!(vector_index.id, 2);
    assert_eq!(v2.last_index_identity, vector_index);

    let file = read_file(&path);
    assert_eq!(file.last_index_id, vector_index);
    assert_eq!(file.entities[0].properties[2].index_id, Some(vector_index));
}

#[test]
fn test_index_uid_change_assigns_new_index() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let build = |index_uid: Option<u64>| {
        let prop = PropertyBuilder::new("title", ValueKind::String);
        let prop = match index_uid {
            Some(uid) => prop.index_with_uid(IndexKind::Value, uid),
            None => prop.index(IndexKind::Value),
        };
        model(vec![EntityBuilder::new("Doc")
            .property(PropertyBuilder::id("id"))
            .property(prop)
            .build()
            .unwrap()])
    };

    let mut v1 = build(None);
    sync_model(&mut v1, &path).unwrap();
    let original = v1.entities[0].properties[1].index.as_ref().unwrap().identity;

    // Same UID pinned: index kept
    let mut v2 = build(Some(original.uid));
    assert!(!sync_model(&mut v2, &path).unwrap());
    assert_eq!(v2.entities[0].properties[1].index.as_ref().unwrap().identity, original);

    // Different UID pinned: a new index identity
    let mut v3 = build(Some(99_999));
    assert!(sync_model(&mut v3, &path).unwrap());
    let replaced = v3.entities[0].properties[1].index.as_ref().unwrap().identity;
    assert_eq!(replaced, IdUid::new(2, 99_999));
    assert_eq!(v3.last_index_identity, replaced);
}

#[test]
fn test_schema_mismatch_leaves_model_untouched() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);

    let mut v1 = model(vec![
        entity("A", &[("name", ValueKind::String)]),
        entity("B", &[("n", ValueKind::Int)]),
    ]);
    sync_model(&mut v1, &path).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let mut v2 = model(vec![
        entity("A", &[("name", ValueKind::String), ("extra", ValueKind::Bool)]),
        entity("B", &[("n", ValueKind::Double)]),
    ]);
    let snapshot = v2.clone();
    let err = sync_model(&mut v2, &path).unwrap_err();
    assert!(matches!(
        err,
        Error::SchemaMismatch { ref entity, ref property, field: "type", .. }
            if entity == "B" && property == "n"
    ));
    assert_eq!(v2, snapshot);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_empty_model() {
    let dir = TempDir::new().unwrap();
    let path = model_path(&dir);
    assert!(matches!(
        sync_model(&mut Model::new(), &path),
        Err(Error::EmptyModel)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Adding properties one at a time never changes the identities of the
    /// existing ones and keeps the per-entity counter equal to the newest.
    #[test]
    fn prop_identities_stable_under_growth(count in 1usize..8) {
        let dir = TempDir::new().unwrap();
        let path = model_path(&dir);
        let names: Vec<String> = (0..count).map(|i| format!("p{}", i)).collect();

        let mut previous: Vec<IdUid> = Vec::new();
        for n in 0..=count {
            let props: Vec<(&str, ValueKind)> =
                names[..n].iter().map(|s| (s.as_str(), ValueKind::Long)).collect();
            let mut m = model(vec![entity("E", &props)]);
            sync_model(&mut m, &path).unwrap();

            let ids: Vec<IdUid> = m.entities[0].properties.iter().map(|p| p.identity).collect();
            prop_assert_eq!(&ids[..previous.len()], &previous[..]);
            prop_assert_eq!(m.entities[0].last_property_identity, *ids.last().unwrap());
            prop_assert_eq!(ids.last().unwrap().id as usize, n + 1);
            previous = ids;
        }
    }
}
