use super::*;
use crate::config::SessionOptions;
use crate::state::storage::{CredentialStorage, MemoryStorage};
use crate::test_helpers::{MockTransport, ME, ada_json, store, t1};
use serde_json::json;

#[test]
fn resource_parses_case_insensitively() {
    assert_eq!("Schools".parse::<Resource>(), Ok(Resource::Schools));
    assert_eq!("students/".parse::<Resource>(), Ok(Resource::Students));
    assert!("courses".parse::<Resource>().is_err());
}

#[test]
fn every_resource_round_trips_through_display() {
    for resource in Resource::ALL {
        assert_eq!(resource.to_string().parse::<Resource>(), Ok(resource));
    }
}

#[test]
fn paths_join_prefix_and_segment() {
    assert_eq!(collection_path("/api/", Resource::Levels), "/api/levels/");
    assert_eq!(collection_path("/api", Resource::Levels), "/api/levels/");
    assert_eq!(record_path("/api/", Resource::Classes, "7"), "/api/classes/7/");
}

#[test]
fn list_items_accepts_array_and_paginated_envelope() {
    assert_eq!(list_items(json!([{ "id": 1 }])).unwrap(), vec![json!({ "id": 1 })]);
    assert_eq!(
        list_items(json!({ "count": 1, "results": [{ "id": 2 }] })).unwrap(),
        vec![json!({ "id": 2 })]
    );
    assert!(list_items(Value::Null).unwrap().is_empty());
}

#[test]
fn list_items_rejects_other_shapes() {
    assert!(matches!(list_items(json!({ "detail": "x" })), Err(SessionError::Malformed(_))));
    assert!(matches!(list_items(json!("text")), Err(SessionError::Malformed(_))));
}

#[tokio::test]
async fn crud_calls_use_expected_methods_and_paths() {
    let transport = MockTransport::new();
    transport
        .on("GET", ME, 200, ada_json())
        .on("GET", "/api/schools/", 200, json!([{ "id": 1, "name": "North" }]))
        .on("POST", "/api/schools/", 201, json!({ "id": 2, "name": "South" }))
        .on("PATCH", "/api/schools/2/", 200, json!({ "id": 2, "name": "South High" }))
        .on_raw("DELETE", "/api/schools/2/", 204, "");
    let storage = MemoryStorage::new();
    storage.save(&t1()).unwrap();
    let store = store(&transport, &storage, SessionOptions::default());
    store.start().await;

    let schools = store.resource(Resource::Schools);
    assert_eq!(schools.list().await.unwrap().len(), 1);
    let created = schools.create(json!({ "name": "South" })).await.unwrap();
    assert_eq!(created["id"], 2);
    let updated = schools.update("2", json!({ "name": "South High" })).await.unwrap();
    assert_eq!(updated["name"], "South High");
    schools.delete("2").await.unwrap();

    let patch = transport.last_call("PATCH", "/api/schools/2/").unwrap();
    assert_eq!(patch.body, Some(json!({ "name": "South High" })));
    assert_eq!(patch.bearer.as_deref(), Some("T1"));
    assert_eq!(transport.count("DELETE", "/api/schools/2/"), 1);
}

#[tokio::test]
async fn create_surfaces_field_errors_verbatim() {
    let transport = MockTransport::new();
    transport.on("GET", ME, 200, ada_json()).on(
        "POST",
        "/api/students/",
        400,
        json!({ "first_name": ["This field is required."], "birth_date": ["Date has wrong format.", "Use YYYY-MM-DD."] }),
    );
    let storage = MemoryStorage::new();
    storage.save(&t1()).unwrap();
    let store = store(&transport, &storage, SessionOptions::default());
    store.start().await;

    let Err(SessionError::Rejected(errors)) = store.resource(Resource::Students).create(json!({})).await else {
        panic!("expected rejected");
    };
    assert_eq!(errors.get("first_name"), Some(&["This field is required.".to_owned()][..]));
    assert_eq!(
        errors.get("birth_date"),
        Some(&["Date has wrong format.".to_owned(), "Use YYYY-MM-DD.".to_owned()][..])
    );
    assert!(store.state().is_authenticated());
}
