// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn maps_modern_lab_document() {
    let doc = json!({
        "id": "lab-1",
        "lab_title": "BGP Core",
        "lab_description": "spine/leaf",
        "state": "STARTED",
        "owner": {"username": "alice", "fullname": "Alice A."},
        "node_count": 7,
        "link_count": 9,
        "groups": [{"name": "net-team"}],
        "created": "2026-01-02T03:04:05Z",
    });
    let obs = lab_observation(&doc).unwrap();
    assert_eq!(obs.lab_id, "lab-1");
    assert_eq!(obs.title, "BGP Core");
    assert_eq!(obs.state, "STARTED");
    assert_eq!(obs.owner_username.as_deref(), Some("alice"));
    assert_eq!(obs.owner_full_name.as_deref(), Some("Alice A."));
    assert_eq!(obs.node_count, 7);
    assert_eq!(obs.groups, vec!["net-team".to_string()]);
    assert!(obs.created_on_service.is_some());
}

#[test]
fn maps_legacy_lab_document() {
    let doc = json!({
        "lab_id": "old-1",
        "title": "legacy",
        "status": "DEFINED_ON_CORE",
        "owner": "bob",
        "nodes": ["n1", "n2"],
        "links": [],
    });
    let obs = lab_observation(&doc).unwrap();
    assert_eq!(obs.lab_id, "old-1");
    assert_eq!(obs.title, "legacy");
    assert_eq!(obs.state, "DEFINED_ON_CORE");
    assert_eq!(obs.owner_username.as_deref(), Some("bob"));
    assert_eq!(obs.node_count, 2);
    assert_eq!(obs.link_count, 0);
}

#[test]
fn document_without_id_is_skipped() {
    assert!(lab_observation(&json!({"title": "orphan"})).is_none());
}

#[parameterized(
    labs_count = { json!({"labs_count": 4}), Some(4) },
    labs = { json!({"labs": 2}), Some(2) },
    running_nodes = { json!({"running_nodes": 3}), Some(3) },
    first_key_wins = { json!({"labs_count": 1, "running_nodes": 9}), Some(1) },
    none = { json!({"cpu": 0.4}), None },
)]
fn labs_count_extraction(stats: serde_json::Value, expected: Option<u32>) {
    assert_eq!(extract_labs_count(&stats), expected);
}
