// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for restart recovery.
//!
//! A snapshot stores the complete fleet state at a point in time. The write
//! path stages to a sibling file and renames over the target, aging the
//! previous snapshots through a small chain of numbered backups, so a torn
//! write never loses the last good state.

use crate::store::FleetState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version written by this build.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

/// Snapshot load/save failures.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// A snapshot of the fleet state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version, checked on load.
    #[serde(rename = "v")]
    pub version: u32,
    /// The complete fleet state
    pub state: FleetState,
    /// When this snapshot was taken
    pub created_at: DateTime<Utc>,
}

/// How many aged snapshots survive alongside the current one.
/// `fleet.json.bak.1` is the most recent, `.bak.3` the oldest.
const BACKUP_DEPTH: u32 = 3;

/// `{path}.bak.{age}` — suffix appended so the `.json` extension stays
/// visible in the backup names.
fn aged_path(path: &Path, age: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".bak.{age}"));
    PathBuf::from(name)
}

impl Snapshot {
    pub fn new(state: FleetState, created_at: DateTime<Utc>) -> Self {
        Self {
            version: CURRENT_SNAPSHOT_VERSION,
            state,
            created_at,
        }
    }

    /// Write atomically: stage the bytes, age the backup chain, rename.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;

        let mut staging = path.as_os_str().to_os_string();
        staging.push(".staging");
        let staging = PathBuf::from(staging);
        fs::write(&staging, &json)?;

        if path.exists() {
            // Age every backup one slot, oldest falls off the end
            for age in (1..=BACKUP_DEPTH).rev() {
                let older = aged_path(path, age);
                let target = if age == BACKUP_DEPTH {
                    let _ = fs::remove_file(&older);
                    continue;
                } else {
                    aged_path(path, age + 1)
                };
                if older.exists() {
                    let _ = fs::rename(&older, target);
                }
            }
            let _ = fs::rename(path, aged_path(path, 1));
        }
        fs::rename(&staging, path)?;
        Ok(())
    }

    /// Load a snapshot; `Ok(None)` when none exists yet.
    pub fn load(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version > CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
