// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! labfleet-storage: the fleet projection store.
//!
//! Two logical collections — `workers` and `lab_records` — held in memory
//! with a unique cloud-instance index, persisted as versioned JSON
//! snapshots. Writes are serialized per process; the command pipeline adds
//! per-aggregate ordering on top.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod snapshot;
mod store;

pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use store::{FleetState, FleetStore, StoreError};
