// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::FleetStore;
use labfleet_core::test_support::{t0, WorkerBuilder};

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");

    let store = FleetStore::new();
    let worker = WorkerBuilder::new("w1").running().build();
    store.upsert_worker(&worker).unwrap();

    Snapshot::new(store.export_state(), t0()).save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.version, CURRENT_SNAPSHOT_VERSION);
    assert_eq!(loaded.created_at, t0());
    assert_eq!(loaded.state.workers.len(), 1);
    assert_eq!(loaded.state.workers[&worker.id], worker);
}

#[test]
fn load_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(Snapshot::load(&path).unwrap().is_none());
}

#[test]
fn save_ages_backups_up_to_the_depth() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");
    let aged = |n: u32| dir.path().join(format!("fleet.json.bak.{n}"));

    for _ in 0..5 {
        Snapshot::new(FleetState::default(), t0()).save(&path).unwrap();
    }

    assert!(path.exists());
    assert!(aged(1).exists());
    assert!(aged(2).exists());
    assert!(aged(3).exists());
    assert!(!aged(4).exists());
}

#[test]
fn backups_keep_the_older_generations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");

    // Three saves with growing state: 0, 1, 2 workers
    let store = FleetStore::new();
    for i in 0..3 {
        Snapshot::new(store.export_state(), t0()).save(&path).unwrap();
        store
            .upsert_worker(
                &WorkerBuilder::new(&format!("w{i}"))
                    .running()
                    .instance_id(&format!("i-{i}"))
                    .build(),
            )
            .unwrap();
    }
    Snapshot::new(store.export_state(), t0()).save(&path).unwrap();

    let newest = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(newest.state.workers.len(), 3);
    let previous = Snapshot::load(&dir.path().join("fleet.json.bak.1"))
        .unwrap()
        .unwrap();
    assert_eq!(previous.state.workers.len(), 2);
    let oldest = Snapshot::load(&dir.path().join("fleet.json.bak.3"))
        .unwrap()
        .unwrap();
    assert_eq!(oldest.state.workers.len(), 0);
}

#[test]
fn future_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");
    let mut snapshot = Snapshot::new(FleetState::default(), t0());
    snapshot.version = CURRENT_SNAPSHOT_VERSION + 1;
    snapshot.save(&path).unwrap();

    assert!(matches!(
        Snapshot::load(&path),
        Err(SnapshotError::UnsupportedVersion(_))
    ));
}

#[test]
fn staging_file_is_not_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");
    Snapshot::new(FleetState::default(), t0()).save(&path).unwrap();
    assert!(!dir.path().join("fleet.json.staging").exists());
}
