// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fleet store with uniqueness indexes.

use labfleet_core::{LabRecord, Worker, WorkerId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Another worker already owns this cloud instance id.
    #[error("instance {instance_id} already imported by worker {owner}")]
    DuplicateInstance {
        instance_id: String,
        owner: WorkerId,
    },
}

/// The serializable document collections.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FleetState {
    pub workers: HashMap<WorkerId, Worker>,
    /// Labs nested per worker; the inner key is the Service-local lab id,
    /// which makes `(worker_id, lab_id)` unique by construction.
    #[serde(default)]
    pub labs: HashMap<WorkerId, BTreeMap<String, LabRecord>>,
}

/// Concurrent store over [`FleetState`].
///
/// Reads return clones. Terminated workers stay in the collection: their
/// instance ids keep occupying the unique index, which is what forbids
/// re-importing a terminated instance.
#[derive(Default)]
pub struct FleetStore {
    state: RwLock<FleetState>,
    /// cloud_instance_id → worker id. Rebuilt on load, not persisted.
    instance_index: RwLock<HashMap<String, WorkerId>>,
}

impl FleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: FleetState) -> Self {
        let store = Self {
            state: RwLock::new(state),
            instance_index: RwLock::new(HashMap::new()),
        };
        store.rebuild_index();
        store
    }

    fn rebuild_index(&self) {
        let state = self.state.read();
        let mut index = HashMap::new();
        for worker in state.workers.values() {
            if let Some(instance_id) = &worker.cloud.instance_id {
                index.insert(instance_id.clone(), worker.id);
            }
        }
        *self.instance_index.write() = index;
    }

    /// Insert or replace a worker document.
    ///
    /// Rejects a cloud instance id already owned by a different worker.
    pub fn upsert_worker(&self, worker: &Worker) -> Result<(), StoreError> {
        let mut index = self.instance_index.write();
        if let Some(instance_id) = &worker.cloud.instance_id {
            if let Some(owner) = index.get(instance_id) {
                if *owner != worker.id {
                    return Err(StoreError::DuplicateInstance {
                        instance_id: instance_id.clone(),
                        owner: *owner,
                    });
                }
            }
            index.insert(instance_id.clone(), worker.id);
        }
        self.state.write().workers.insert(worker.id, worker.clone());
        Ok(())
    }

    pub fn get_worker(&self, id: WorkerId) -> Option<Worker> {
        self.state.read().workers.get(&id).cloned()
    }

    pub fn worker_id_for_instance(&self, instance_id: &str) -> Option<WorkerId> {
        self.instance_index.read().get(instance_id).copied()
    }

    pub fn list_workers(&self) -> Vec<Worker> {
        let mut workers: Vec<_> = self.state.read().workers.values().cloned().collect();
        workers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        workers
    }

    /// Workers eligible for reconciliation fan-out.
    pub fn active_workers(&self) -> Vec<Worker> {
        self.list_workers()
            .into_iter()
            .filter(|w| w.is_active())
            .collect()
    }

    pub fn workers_in_region(&self, region: &str) -> Vec<Worker> {
        self.list_workers()
            .into_iter()
            .filter(|w| w.region == region)
            .collect()
    }

    pub fn worker_count(&self) -> usize {
        self.state.read().workers.len()
    }

    pub fn upsert_lab(&self, lab: &LabRecord) {
        self.state
            .write()
            .labs
            .entry(lab.worker_id)
            .or_default()
            .insert(lab.lab_id.clone(), lab.clone());
    }

    pub fn get_lab(&self, worker_id: WorkerId, lab_id: &str) -> Option<LabRecord> {
        self.state
            .read()
            .labs
            .get(&worker_id)
            .and_then(|labs| labs.get(lab_id))
            .cloned()
    }

    pub fn labs_for_worker(&self, worker_id: WorkerId) -> Vec<LabRecord> {
        self.state
            .read()
            .labs
            .get(&worker_id)
            .map(|labs| labs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn lab_ids_for_worker(&self, worker_id: WorkerId) -> Vec<String> {
        self.state
            .read()
            .labs
            .get(&worker_id)
            .map(|labs| labs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn remove_lab(&self, worker_id: WorkerId, lab_id: &str) -> bool {
        let mut state = self.state.write();
        let Some(labs) = state.labs.get_mut(&worker_id) else {
            return false;
        };
        let removed = labs.remove(lab_id).is_some();
        if labs.is_empty() {
            state.labs.remove(&worker_id);
        }
        removed
    }

    /// Clone of the full state, for snapshots.
    pub fn export_state(&self) -> FleetState {
        self.state.read().clone()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
