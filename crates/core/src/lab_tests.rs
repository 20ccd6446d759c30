// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{lab_obs, t0};
use crate::WorkerId;
use chrono::Duration;
use proptest::prelude::*;

#[test]
fn first_observation_creates_record_without_history() {
    let record = LabRecord::from_observation(WorkerId::new(), &lab_obs("lab-1", "BGP", "STARTED"), t0());
    assert_eq!(record.lab_id, "lab-1");
    assert_eq!(record.title, "BGP");
    assert_eq!(record.state, "STARTED");
    assert_eq!(record.first_seen_at, t0());
    assert!(record.operation_history.is_empty());
}

#[test]
fn unchanged_observation_only_advances_sync_time() {
    let obs = lab_obs("lab-1", "BGP", "STARTED");
    let mut record = LabRecord::from_observation(WorkerId::new(), &obs, t0());
    let later = t0() + Duration::seconds(60);

    let entry = record.update_from_service(&obs, later);
    assert!(entry.is_none());
    assert_eq!(record.last_synced_at, later);
    assert!(record.operation_history.is_empty());
}

#[test]
fn changed_fields_are_recorded_with_old_and_new() {
    let mut record =
        LabRecord::from_observation(WorkerId::new(), &lab_obs("lab-1", "BGP", "STARTED"), t0());

    let mut next = lab_obs("lab-1", "BGP v2", "STOPPED");
    next.node_count = 5;
    let entry = record
        .update_from_service(&next, t0() + Duration::seconds(10))
        .unwrap();

    assert_eq!(entry.previous_state, "STARTED");
    assert_eq!(entry.new_state, "STOPPED");
    assert_eq!(entry.changed_fields["title"].old, "BGP");
    assert_eq!(entry.changed_fields["title"].new, "BGP v2");
    assert_eq!(entry.changed_fields["node_count"].new, 5);
    assert!(!entry.changed_fields.contains_key("link_count"));

    assert_eq!(record.title, "BGP v2");
    assert_eq!(record.state, "STOPPED");
    assert_eq!(record.node_count, 5);
    assert_eq!(record.operation_history.len(), 1);
}

#[test]
fn history_ring_evicts_oldest_beyond_limit() {
    let mut record =
        LabRecord::from_observation(WorkerId::new(), &lab_obs("lab-1", "t0", "DEFINED"), t0());

    for i in 0..(HISTORY_LIMIT + 10) {
        let obs = lab_obs("lab-1", &format!("t{}", i + 1), "DEFINED");
        let at = t0() + Duration::seconds(i as i64 + 1);
        assert!(record.update_from_service(&obs, at).is_some());
    }

    assert_eq!(record.operation_history.len(), HISTORY_LIMIT);
    // Oldest entries were evicted: the front reflects change #11
    let front = record.operation_history.front().unwrap();
    assert_eq!(front.changed_fields["title"].new, "t11");
}

#[test]
fn apply_change_mirrors_update() {
    let worker_id = WorkerId::new();
    let obs = lab_obs("lab-1", "BGP", "STARTED");
    let mut record = LabRecord::from_observation(worker_id, &obs, t0());
    let mut twin = record.clone();

    let mut next = lab_obs("lab-1", "OSPF", "STOPPED");
    next.groups = vec!["net".to_string()];
    let entry = record
        .update_from_service(&next, t0() + Duration::seconds(5))
        .unwrap();

    twin.apply_change(&entry);
    assert_eq!(twin.title, record.title);
    assert_eq!(twin.state, record.state);
    assert_eq!(twin.groups, record.groups);
    assert_eq!(twin.operation_history, record.operation_history);
}

proptest! {
    #[test]
    fn history_never_exceeds_limit_and_is_time_ordered(updates in 1usize..200) {
        let mut record =
            LabRecord::from_observation(WorkerId::new(), &lab_obs("lab-1", "t", "DEFINED"), t0());
        for i in 0..updates {
            let obs = lab_obs("lab-1", &format!("t{i}"), "DEFINED");
            let _ = record.update_from_service(&obs, t0() + Duration::seconds(i as i64));
        }
        prop_assert!(record.operation_history.len() <= HISTORY_LIMIT);
        let stamps: Vec<_> = record.operation_history.iter().map(|e| e.timestamp).collect();
        prop_assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
