// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-event envelopes pushed to stream subscribers.

use chrono::{DateTime, Utc};
use labfleet_core::{DomainEvent, LabEvent, WorkerEvent};
use serde::{Deserialize, Serialize};

/// Envelope type strings, dot-separated by aggregate and change kind.
pub mod kind {
    pub const WORKER_CREATED: &str = "worker.created";
    pub const WORKER_PROVISIONED: &str = "worker.provisioned";
    pub const WORKER_PROVISION_FAILED: &str = "worker.provision_failed";
    pub const WORKER_IMPORTED: &str = "worker.imported";
    pub const WORKER_STATUS_CHANGED: &str = "worker.status_changed";
    pub const WORKER_CLOUD_METRICS_UPDATED: &str = "worker.cloud_metrics_updated";
    pub const WORKER_SERVICE_UPDATED: &str = "worker.service_updated";
    pub const WORKER_TAGS_UPDATED: &str = "worker.tags_updated";
    pub const WORKER_SNAPSHOT: &str = "worker.snapshot";
    pub const WORKER_PAUSED: &str = "worker.paused";
    pub const WORKER_RESUMED: &str = "worker.resumed";
    pub const WORKER_IDLE_DETECTION_TOGGLED: &str = "worker.idle_detection.toggled";
    pub const WORKER_ACTIVITY: &str = "worker.activity";
    pub const WORKER_TERMINATED: &str = "worker.terminated";
    pub const WORKER_SYNC_FAILED: &str = "worker.sync.failed";
    pub const LAB_CREATED: &str = "lab.created";
    pub const LAB_UPDATED: &str = "lab.updated";
    pub const LAB_DELETED: &str = "lab.deleted";
}

/// The JSON object delivered on the push stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    /// Worker id the change belongs to.
    pub source: String,
    pub time: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(
        kind: &str,
        source: impl Into<String>,
        time: DateTime<Utc>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            source: source.into(),
            time,
            data,
        }
    }

    /// Translate a domain event into its wire envelope.
    ///
    /// Events whose payload already tells the subscriber everything map
    /// directly; the `worker.snapshot` resync envelope is appended
    /// separately by the relay since it needs the full aggregate.
    pub fn from_domain_event(event: &DomainEvent, time: DateTime<Utc>) -> Envelope {
        match event {
            DomainEvent::Worker(event) => Self::from_worker_event(event, time),
            DomainEvent::Lab(event) => Self::from_lab_event(event, time),
        }
    }

    fn from_worker_event(event: &WorkerEvent, time: DateTime<Utc>) -> Envelope {
        let source = event.worker_id().to_string();
        let data = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        let kind = match event {
            WorkerEvent::Created { .. } => kind::WORKER_CREATED,
            WorkerEvent::Provisioned { .. } => kind::WORKER_PROVISIONED,
            WorkerEvent::ProvisionFailed { .. } => kind::WORKER_PROVISION_FAILED,
            WorkerEvent::Imported { .. } => kind::WORKER_IMPORTED,
            WorkerEvent::StatusChanged { to, .. } => {
                if *to == labfleet_core::WorkerStatus::Terminated {
                    kind::WORKER_TERMINATED
                } else {
                    kind::WORKER_STATUS_CHANGED
                }
            }
            WorkerEvent::CloudHealthUpdated { .. }
            | WorkerEvent::CloudUtilizationUpdated { .. }
            | WorkerEvent::CloudFactsUpdated { .. } => kind::WORKER_CLOUD_METRICS_UPDATED,
            WorkerEvent::TagsUpdated { .. } => kind::WORKER_TAGS_UPDATED,
            WorkerEvent::ServiceUpdated { .. } => kind::WORKER_SERVICE_UPDATED,
            WorkerEvent::ActivityObserved { .. } => kind::WORKER_ACTIVITY,
            WorkerEvent::IdleDetectionSet { .. } => kind::WORKER_IDLE_DETECTION_TOGGLED,
            WorkerEvent::AutoPaused { .. } => kind::WORKER_PAUSED,
            WorkerEvent::Resumed { .. } => kind::WORKER_RESUMED,
        };
        Envelope::new(kind, source, time, data)
    }

    fn from_lab_event(event: &LabEvent, time: DateTime<Utc>) -> Envelope {
        let (kind, source) = match event {
            LabEvent::Created { worker_id, .. } => (kind::LAB_CREATED, worker_id),
            LabEvent::Updated { worker_id, .. } => (kind::LAB_UPDATED, worker_id),
            LabEvent::Deleted { worker_id, .. } => (kind::LAB_DELETED, worker_id),
        };
        let data = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        Envelope::new(kind, source.to_string(), time, data)
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
