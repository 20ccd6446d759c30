// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST projections of the aggregates.

use chrono::{DateTime, Utc};
use labfleet_core::{LabRecord, ServiceStatus, Worker, WorkerStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full worker projection returned by the API and carried in
/// `worker.snapshot` envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerDto {
    pub id: String,
    pub name: String,
    pub region: String,
    pub status: WorkerStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub service_status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    pub service_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labs_count: Option<u32>,
    pub idle_detection_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_since: Option<DateTime<Utc>>,
    pub paused_by_system: bool,
}

impl From<&Worker> for WorkerDto {
    fn from(w: &Worker) -> Self {
        Self {
            id: w.id.to_string(),
            name: w.name.clone(),
            region: w.region.clone(),
            status: w.status,
            created_at: w.created_at,
            created_by: w.created_by.clone(),
            cloud_instance_id: w.cloud.instance_id.clone(),
            instance_type: w.cloud.instance_type.clone(),
            image_id: w.cloud.image_id.clone(),
            image_name: w.cloud.image_name.clone(),
            public_ip: w.cloud.public_ip.clone(),
            private_ip: w.cloud.private_ip.clone(),
            tags: w.cloud.tags.clone(),
            service_status: w.service.status,
            service_version: w.service.version.clone(),
            service_ready: w.service.ready,
            labs_count: w.service.labs_count,
            idle_detection_enabled: w.idle.detection_enabled,
            last_activity_at: w.idle.last_activity_at,
            idle_since: w.idle.idle_since,
            paused_by_system: w.idle.paused_by_system,
        }
    }
}

/// Metric-slot projection for `GET .../metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetricsDto {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_pct: Option<f64>,
    pub detailed_monitoring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_collected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_synced_at: Option<DateTime<Utc>>,
}

impl From<&Worker> for WorkerMetricsDto {
    fn from(w: &Worker) -> Self {
        Self {
            id: w.id.to_string(),
            instance_state: w.cloud_health.instance_state.clone(),
            system_status: w.cloud_health.system_status.clone(),
            last_checked_at: w.cloud_health.last_checked_at,
            cpu_pct: w.utilization.cpu_pct,
            mem_pct: w.utilization.mem_pct,
            detailed_monitoring: w.utilization.detailed_monitoring,
            last_collected_at: w.utilization.last_collected_at,
            service_synced_at: w.service.last_synced_at,
        }
    }
}

/// Lab projection for `GET .../labs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabDto {
    pub worker_id: String,
    pub lab_id: String,
    pub title: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    pub node_count: u32,
    pub link_count: u32,
    pub first_seen_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    pub history_len: usize,
}

impl From<&LabRecord> for LabDto {
    fn from(lab: &LabRecord) -> Self {
        Self {
            worker_id: lab.worker_id.to_string(),
            lab_id: lab.lab_id.clone(),
            title: lab.title.clone(),
            state: lab.state.clone(),
            owner_username: lab.owner_username.clone(),
            node_count: lab.node_count,
            link_count: lab.link_count,
            first_seen_at: lab.first_seen_at,
            last_synced_at: lab.last_synced_at,
            history_len: lab.operation_history.len(),
        }
    }
}

/// One instance that failed during a bulk import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkImportFailure {
    pub instance_id: String,
    pub error: String,
}

/// Result summary for `BulkImportWorkers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkImportSummary {
    pub imported: Vec<String>,
    pub already_imported: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<BulkImportFailure>,
}

/// Per-tick outcome counts logged by the reconciliation scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[cfg(test)]
#[path = "dto_tests.rs"]
mod tests;
