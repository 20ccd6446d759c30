// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events for the fleet control plane.
//!
//! Every aggregate mutation is expressed as an event, applied through the
//! reducers in [`crate::worker`] and [`crate::lab`]. Events are published to
//! the fan-out bus only after the mutated aggregate has been persisted.
//!
//! Serializes with `{"type": "worker:provisioned", ...fields}` format.

use crate::id::WorkerId;
use crate::lab::LabChangeEntry;
use crate::service_state::ServiceSnapshot;
use crate::worker::{CloudFacts, WorkerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Events that mutate the Worker aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerEvent {
    #[serde(rename = "worker:created")]
    Created {
        id: WorkerId,
        name: String,
        region: String,
        created_by: String,
        created_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_name: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        tags: BTreeMap<String, String>,
    },

    /// Cloud resource exists; the instance id becomes immutable from here.
    #[serde(rename = "worker:provisioned")]
    Provisioned {
        id: WorkerId,
        cloud_instance_id: String,
        /// Whether detailed cloud monitoring was enabled at launch.
        #[serde(default)]
        detailed_monitoring: bool,
        at: DateTime<Utc>,
    },

    #[serde(rename = "worker:provision_failed")]
    ProvisionFailed {
        id: WorkerId,
        error: String,
        at: DateTime<Utc>,
    },

    /// Adoption of a pre-existing cloud instance. Carries the full fact set
    /// observed at import time; a `StatusChanged` event follows with the
    /// status derived from the instance's cloud state.
    #[serde(rename = "worker:imported")]
    Imported {
        id: WorkerId,
        name: String,
        region: String,
        created_by: String,
        created_at: DateTime<Utc>,
        facts: CloudFacts,
    },

    #[serde(rename = "worker:status_changed")]
    StatusChanged {
        id: WorkerId,
        from: WorkerStatus,
        to: WorkerStatus,
        at: DateTime<Utc>,
    },

    /// Cloud health slot (source: cloud status API).
    #[serde(rename = "worker:cloud_health_updated")]
    CloudHealthUpdated {
        id: WorkerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        system_status: Option<String>,
        at: DateTime<Utc>,
    },

    /// Cloud utilization slot (source: cloud metrics API).
    #[serde(rename = "worker:cloud_utilization_updated")]
    CloudUtilizationUpdated {
        id: WorkerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cpu_pct: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mem_pct: Option<f64>,
        detailed_monitoring: bool,
        at: DateTime<Utc>,
    },

    /// Refreshed VM facts from a cloud describe call. The reducer never
    /// overwrites an already-assigned instance id.
    #[serde(rename = "worker:cloud_facts_updated")]
    CloudFactsUpdated { id: WorkerId, facts: CloudFacts },

    #[serde(rename = "worker:tags_updated")]
    TagsUpdated {
        id: WorkerId,
        tags: BTreeMap<String, String>,
        at: DateTime<Utc>,
    },

    /// Service slot (source: Service API). The snapshot carries its own
    /// `last_synced_at`.
    #[serde(rename = "worker:service_updated")]
    ServiceUpdated {
        id: WorkerId,
        snapshot: ServiceSnapshot,
    },

    #[serde(rename = "worker:activity_observed")]
    ActivityObserved { id: WorkerId, at: DateTime<Utc> },

    #[serde(rename = "worker:idle_detection_set")]
    IdleDetectionSet {
        id: WorkerId,
        enabled: bool,
        at: DateTime<Utc>,
    },

    /// Auto-pause decision taken by idle detection.
    #[serde(rename = "worker:auto_paused")]
    AutoPaused { id: WorkerId, at: DateTime<Utc> },

    #[serde(rename = "worker:resumed")]
    Resumed { id: WorkerId, at: DateTime<Utc> },
}

impl WorkerEvent {
    /// Worker this event belongs to.
    pub fn worker_id(&self) -> WorkerId {
        match self {
            WorkerEvent::Created { id, .. }
            | WorkerEvent::Provisioned { id, .. }
            | WorkerEvent::ProvisionFailed { id, .. }
            | WorkerEvent::Imported { id, .. }
            | WorkerEvent::StatusChanged { id, .. }
            | WorkerEvent::CloudHealthUpdated { id, .. }
            | WorkerEvent::CloudUtilizationUpdated { id, .. }
            | WorkerEvent::CloudFactsUpdated { id, .. }
            | WorkerEvent::TagsUpdated { id, .. }
            | WorkerEvent::ServiceUpdated { id, .. }
            | WorkerEvent::ActivityObserved { id, .. }
            | WorkerEvent::IdleDetectionSet { id, .. }
            | WorkerEvent::AutoPaused { id, .. }
            | WorkerEvent::Resumed { id, .. } => *id,
        }
    }
}

/// Events that mutate the LabRecord projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LabEvent {
    #[serde(rename = "lab:created")]
    Created {
        worker_id: WorkerId,
        lab_id: String,
        title: String,
        state: String,
        at: DateTime<Utc>,
    },

    #[serde(rename = "lab:updated")]
    Updated {
        worker_id: WorkerId,
        lab_id: String,
        entry: LabChangeEntry,
    },

    /// Removed locally: either a confirmed Service-side delete or an orphan
    /// detected during a labs refresh.
    #[serde(rename = "lab:deleted")]
    Deleted {
        worker_id: WorkerId,
        lab_id: String,
        at: DateTime<Utc>,
    },
}

/// Union published to the fan-out bus by the command pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Worker(WorkerEvent),
    Lab(LabEvent),
}

impl From<WorkerEvent> for DomainEvent {
    fn from(e: WorkerEvent) -> Self {
        DomainEvent::Worker(e)
    }
}

impl From<LabEvent> for DomainEvent {
    fn from(e: LabEvent) -> Self {
        DomainEvent::Lab(e)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
