// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use labfleet_core::test_support::{imported_worker, lab_obs, t0, WorkerBuilder};
use labfleet_core::{LabRecord, WorkerStatus};

#[test]
fn upsert_and_get_round_trip() {
    let store = FleetStore::new();
    let worker = WorkerBuilder::new("w1").running().build();
    store.upsert_worker(&worker).unwrap();

    let loaded = store.get_worker(worker.id).unwrap();
    assert_eq!(loaded, worker);
    assert_eq!(store.worker_count(), 1);
}

#[test]
fn duplicate_instance_id_is_rejected() {
    let store = FleetStore::new();
    let first = imported_worker("w1", "i-1");
    store.upsert_worker(&first).unwrap();

    let second = imported_worker("w2", "i-1");
    let err = store.upsert_worker(&second).unwrap_err();
    assert_eq!(
        err,
        StoreError::DuplicateInstance {
            instance_id: "i-1".to_string(),
            owner: first.id,
        }
    );
    assert_eq!(store.worker_count(), 1);
}

#[test]
fn reupserting_same_worker_is_fine() {
    let store = FleetStore::new();
    let mut worker = imported_worker("w1", "i-1");
    store.upsert_worker(&worker).unwrap();

    worker.transition_to(WorkerStatus::Stopping, t0()).unwrap();
    store.upsert_worker(&worker).unwrap();
    assert_eq!(
        store.get_worker(worker.id).unwrap().status,
        WorkerStatus::Stopping
    );
}

#[test]
fn instance_index_finds_worker() {
    let store = FleetStore::new();
    let worker = imported_worker("w1", "i-1");
    store.upsert_worker(&worker).unwrap();
    assert_eq!(store.worker_id_for_instance("i-1"), Some(worker.id));
    assert_eq!(store.worker_id_for_instance("i-2"), None);
}

#[test]
fn active_workers_excludes_terminated_and_failed() {
    let store = FleetStore::new();
    let running = WorkerBuilder::new("up").running().instance_id("i-up").build();
    let mut terminated = WorkerBuilder::new("gone")
        .running()
        .instance_id("i-gone")
        .build();
    terminated
        .transition_to(WorkerStatus::Terminating, t0())
        .unwrap();
    terminated
        .transition_to(WorkerStatus::Terminated, t0())
        .unwrap();
    let mut failed = WorkerBuilder::new("broken").build();
    failed.record_provision_failed("boom", t0());

    store.upsert_worker(&running).unwrap();
    store.upsert_worker(&terminated).unwrap();
    store.upsert_worker(&failed).unwrap();

    let active = store.active_workers();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, running.id);
}

#[test]
fn terminated_worker_keeps_instance_id_reserved() {
    let store = FleetStore::new();
    let mut worker = imported_worker("w1", "i-1");
    worker
        .transition_to(WorkerStatus::Terminating, t0())
        .unwrap();
    worker
        .transition_to(WorkerStatus::Terminated, t0())
        .unwrap();
    store.upsert_worker(&worker).unwrap();

    let reimport = imported_worker("w2", "i-1");
    assert!(store.upsert_worker(&reimport).is_err());
}

#[test]
fn labs_are_unique_per_worker_and_lab_id() {
    let store = FleetStore::new();
    let worker = WorkerBuilder::new("w1").running().build();
    let lab = LabRecord::from_observation(worker.id, &lab_obs("lab-1", "BGP", "STARTED"), t0());

    store.upsert_lab(&lab);
    store.upsert_lab(&lab);
    assert_eq!(store.labs_for_worker(worker.id).len(), 1);
    assert_eq!(store.lab_ids_for_worker(worker.id), vec!["lab-1".to_string()]);
}

#[test]
fn remove_lab_reports_presence() {
    let store = FleetStore::new();
    let worker = WorkerBuilder::new("w1").running().build();
    let lab = LabRecord::from_observation(worker.id, &lab_obs("lab-1", "BGP", "STARTED"), t0());
    store.upsert_lab(&lab);

    assert!(store.remove_lab(worker.id, "lab-1"));
    assert!(!store.remove_lab(worker.id, "lab-1"));
    assert!(store.get_lab(worker.id, "lab-1").is_none());
}

#[test]
fn from_state_rebuilds_instance_index() {
    let store = FleetStore::new();
    let worker = imported_worker("w1", "i-1");
    store.upsert_worker(&worker).unwrap();

    let reloaded = FleetStore::from_state(store.export_state());
    assert_eq!(reloaded.worker_id_for_instance("i-1"), Some(worker.id));
}

#[test]
fn workers_in_region_filters() {
    let store = FleetStore::new();
    store
        .upsert_worker(&WorkerBuilder::new("a").region("r1").build())
        .unwrap();
    store
        .upsert_worker(&WorkerBuilder::new("b").region("r2").build())
        .unwrap();
    assert_eq!(store.workers_in_region("r1").len(), 1);
    assert_eq!(store.workers_in_region("r3").len(), 0);
}
