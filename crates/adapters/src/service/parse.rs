// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tolerant mapping from Service JSON onto lab observations.
//!
//! The lab schema drifted across Service versions: ids appear as `id` or
//! `lab_id`, titles as `lab_title` or `title`, and owners as either a plain
//! username string or an object.

use chrono::{DateTime, Utc};
use labfleet_core::LabObservation;
use serde_json::Value;

/// Map one lab document onto an observation. Returns `None` when no id can
/// be found at all.
pub fn lab_observation(value: &Value) -> Option<LabObservation> {
    let lab_id = string_field(value, &["id", "lab_id"])?;

    let (owner_username, owner_full_name) = match value.get("owner") {
        Some(Value::String(username)) => (Some(username.clone()), None),
        Some(Value::Object(owner)) => (
            owner
                .get("username")
                .and_then(Value::as_str)
                .map(str::to_string),
            owner
                .get("fullname")
                .or_else(|| owner.get("full_name"))
                .and_then(Value::as_str)
                .map(str::to_string),
        ),
        _ => (None, None),
    };

    Some(LabObservation {
        lab_id,
        title: string_field(value, &["lab_title", "title"]).unwrap_or_default(),
        description: string_field(value, &["lab_description", "description"]).unwrap_or_default(),
        notes: string_field(value, &["lab_notes", "notes"]).unwrap_or_default(),
        state: string_field(value, &["state", "status"]).unwrap_or_default(),
        owner_username,
        owner_full_name,
        node_count: count_field(value, &["node_count", "nodes"]),
        link_count: count_field(value, &["link_count", "links"]),
        groups: value
            .get("groups")
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|g| match g {
                        Value::String(name) => Some(name.clone()),
                        Value::Object(group) => group
                            .get("name")
                            .or_else(|| group.get("id"))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default(),
        created_on_service: time_field(value, &["created", "created_on"]),
        modified_on_service: time_field(value, &["modified", "modified_on"]),
    })
}

/// Labs count as reported by the Service's stats document.
pub fn extract_labs_count(stats: &Value) -> Option<u32> {
    for key in ["labs_count", "labs", "running_labs", "running_nodes"] {
        if let Some(n) = stats.get(key).and_then(Value::as_u64) {
            return Some(n as u32);
        }
    }
    None
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn count_field(value: &Value, keys: &[&str]) -> u32 {
    keys.iter()
        .find_map(|key| {
            let field = value.get(key)?;
            field
                .as_u64()
                .or_else(|| field.as_array().map(|a| a.len() as u64))
        })
        .unwrap_or(0) as u32
}

fn time_field(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
