// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lab projections.
//!
//! One [`LabRecord`] per `(worker_id, lab_id)` pair, created on first
//! observation during a labs refresh and updated with change detection on
//! subsequent refreshes. A bounded operation-history ring keeps the last 50
//! observed changes.

use crate::id::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Maximum entries kept in a lab's operation history; oldest evicted.
pub const HISTORY_LIMIT: usize = 50;

/// A lab as observed on the Service during a refresh. Pure data; the
/// adapter maps the Service's JSON onto this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabObservation {
    pub lab_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_full_name: Option<String>,
    #[serde(default)]
    pub node_count: u32,
    #[serde(default)]
    pub link_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on_service: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on_service: Option<DateTime<Utc>>,
}

/// Old/new pair for one tracked field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

/// One operation-history entry, recorded when a refresh observed a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabChangeEntry {
    pub timestamp: DateTime<Utc>,
    pub previous_state: String,
    pub new_state: String,
    pub changed_fields: BTreeMap<String, FieldChange>,
}

/// Local projection of a Service-side lab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabRecord {
    pub worker_id: WorkerId,
    pub lab_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_full_name: Option<String>,
    #[serde(default)]
    pub node_count: u32,
    #[serde(default)]
    pub link_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on_service: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on_service: Option<DateTime<Utc>>,
    pub first_seen_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    #[serde(default)]
    pub operation_history: VecDeque<LabChangeEntry>,
}

impl LabRecord {
    /// First observation of a Service-side lab.
    pub fn from_observation(
        worker_id: WorkerId,
        obs: &LabObservation,
        now: DateTime<Utc>,
    ) -> LabRecord {
        LabRecord {
            worker_id,
            lab_id: obs.lab_id.clone(),
            title: obs.title.clone(),
            description: obs.description.clone(),
            notes: obs.notes.clone(),
            state: obs.state.clone(),
            owner_username: obs.owner_username.clone(),
            owner_full_name: obs.owner_full_name.clone(),
            node_count: obs.node_count,
            link_count: obs.link_count,
            groups: obs.groups.clone(),
            created_on_service: obs.created_on_service,
            modified_on_service: obs.modified_on_service,
            first_seen_at: now,
            last_synced_at: now,
            operation_history: VecDeque::new(),
        }
    }

    /// Fold a fresh observation into this record.
    ///
    /// `last_synced_at` always advances. A history entry is appended only
    /// when a tracked field actually changed; the returned entry feeds the
    /// `lab:updated` event.
    pub fn update_from_service(
        &mut self,
        obs: &LabObservation,
        now: DateTime<Utc>,
    ) -> Option<LabChangeEntry> {
        let changed_fields = self.diff(obs);
        self.last_synced_at = now;
        if changed_fields.is_empty() {
            return None;
        }

        let entry = LabChangeEntry {
            timestamp: now,
            previous_state: self.state.clone(),
            new_state: obs.state.clone(),
            changed_fields,
        };

        self.title = obs.title.clone();
        self.description = obs.description.clone();
        self.notes = obs.notes.clone();
        self.state = obs.state.clone();
        self.owner_username = obs.owner_username.clone();
        self.owner_full_name = obs.owner_full_name.clone();
        self.node_count = obs.node_count;
        self.link_count = obs.link_count;
        self.groups = obs.groups.clone();
        self.created_on_service = obs.created_on_service;
        self.modified_on_service = obs.modified_on_service;

        self.push_history(entry.clone());
        Some(entry)
    }

    /// Apply an already-recorded change entry (reducer for `lab:updated`).
    pub fn apply_change(&mut self, entry: &LabChangeEntry) {
        self.state = entry.new_state.clone();
        for (field, change) in &entry.changed_fields {
            self.apply_field(field, &change.new);
        }
        self.last_synced_at = self.last_synced_at.max(entry.timestamp);
        self.push_history(entry.clone());
    }

    fn push_history(&mut self, entry: LabChangeEntry) {
        self.operation_history.push_back(entry);
        while self.operation_history.len() > HISTORY_LIMIT {
            self.operation_history.pop_front();
        }
    }

    fn apply_field(&mut self, field: &str, value: &serde_json::Value) {
        match field {
            "title" => {
                if let Some(s) = value.as_str() {
                    self.title = s.to_string();
                }
            }
            "description" => {
                if let Some(s) = value.as_str() {
                    self.description = s.to_string();
                }
            }
            "notes" => {
                if let Some(s) = value.as_str() {
                    self.notes = s.to_string();
                }
            }
            "owner_username" => {
                self.owner_username = value.as_str().map(str::to_string);
            }
            "owner_full_name" => {
                self.owner_full_name = value.as_str().map(str::to_string);
            }
            "node_count" => {
                if let Some(n) = value.as_u64() {
                    self.node_count = n as u32;
                }
            }
            "link_count" => {
                if let Some(n) = value.as_u64() {
                    self.link_count = n as u32;
                }
            }
            "groups" => {
                if let Ok(groups) = serde_json::from_value(value.clone()) {
                    self.groups = groups;
                }
            }
            // "state" is carried by new_state
            _ => {}
        }
    }

    fn diff(&self, obs: &LabObservation) -> BTreeMap<String, FieldChange> {
        let mut changed = BTreeMap::new();
        let mut track = |field: &str, old: serde_json::Value, new: serde_json::Value| {
            if old != new {
                changed.insert(field.to_string(), FieldChange { old, new });
            }
        };
        track("title", self.title.clone().into(), obs.title.clone().into());
        track(
            "description",
            self.description.clone().into(),
            obs.description.clone().into(),
        );
        track("notes", self.notes.clone().into(), obs.notes.clone().into());
        track("state", self.state.clone().into(), obs.state.clone().into());
        track(
            "owner_username",
            json_opt(&self.owner_username),
            json_opt(&obs.owner_username),
        );
        track(
            "owner_full_name",
            json_opt(&self.owner_full_name),
            json_opt(&obs.owner_full_name),
        );
        track("node_count", self.node_count.into(), obs.node_count.into());
        track("link_count", self.link_count.into(), obs.link_count.into());
        track(
            "groups",
            serde_json::Value::from(self.groups.clone()),
            serde_json::Value::from(obs.groups.clone()),
        );
        changed
    }
}

fn json_opt(value: &Option<String>) -> serde_json::Value {
    match value {
        Some(s) => serde_json::Value::String(s.clone()),
        None => serde_json::Value::Null,
    }
}

#[cfg(test)]
#[path = "lab_tests.rs"]
mod tests;
