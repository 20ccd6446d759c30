// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Worker aggregate.
//!
//! One worker per managed VM. Every mutation is expressed as a
//! [`WorkerEvent`] appended to an in-memory pending list and applied through
//! [`Worker::apply`]; the pipeline drains the list with
//! [`Worker::take_events`] after persistence and hands the events to the
//! fan-out. Replaying a drained sequence over [`Worker::from_events`] yields
//! an equal aggregate.

use crate::error::DomainError;
use crate::event::WorkerEvent;
use crate::id::WorkerId;
use crate::service_state::{ServiceSnapshot, ServiceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Worker lifecycle status.
///
/// Transitions are restricted to the graph encoded in
/// [`WorkerStatus::can_transition_to`]; anything else is a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Pending,
    Provisioned,
    Running,
    Stopping,
    Stopped,
    Starting,
    Terminating,
    Terminated,
    Failed,
    Imported,
}

impl WorkerStatus {
    /// Edge check for the lifecycle graph.
    pub fn can_transition_to(self, to: WorkerStatus) -> bool {
        use WorkerStatus::*;
        match (self, to) {
            // Provisioning saga
            (Pending, Provisioned) | (Pending, Failed) => true,
            (Provisioned, Running) | (Provisioned, Failed) => true,
            // Start/stop cycle
            (Running, Stopping) => true,
            (Stopping, Stopped) => true,
            (Stopped, Starting) => true,
            (Starting, Running) => true,
            // Imported workers settle into whatever the cloud reports
            (Imported, Running)
            | (Imported, Stopping)
            | (Imported, Stopped)
            | (Imported, Starting) => true,
            // Terminate is reachable from any non-terminated state
            (Terminated, _) => false,
            (Terminating, Terminated) => true,
            (_, Terminating) => true,
            _ => false,
        }
    }

    /// Terminal states are excluded from reconciliation fan-out.
    pub fn is_active(self) -> bool {
        !matches!(self, WorkerStatus::Terminated | WorkerStatus::Failed)
    }

    /// Map a cloud instance state name onto a worker status.
    ///
    /// Transitional cloud states map conservatively; unknown names yield
    /// `None` and the observation is skipped.
    pub fn from_cloud_state(state: &str) -> Option<WorkerStatus> {
        match state {
            "pending" => Some(WorkerStatus::Starting),
            "running" => Some(WorkerStatus::Running),
            "stopping" => Some(WorkerStatus::Stopping),
            "stopped" => Some(WorkerStatus::Stopped),
            "shutting-down" => Some(WorkerStatus::Terminating),
            "terminated" => Some(WorkerStatus::Terminated),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerStatus::Pending => "PENDING",
            WorkerStatus::Provisioned => "PROVISIONED",
            WorkerStatus::Running => "RUNNING",
            WorkerStatus::Stopping => "STOPPING",
            WorkerStatus::Stopped => "STOPPED",
            WorkerStatus::Starting => "STARTING",
            WorkerStatus::Terminating => "TERMINATING",
            WorkerStatus::Terminated => "TERMINATED",
            WorkerStatus::Failed => "FAILED",
            WorkerStatus::Imported => "IMPORTED",
        };
        write!(f, "{s}")
    }
}

/// Facts about the backing VM, sourced from the cloud API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudFacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Cloud health slot (source: cloud status API).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudHealth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Cloud utilization slot (source: cloud metrics API).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudUtilization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_pct: Option<f64>,
    #[serde(default)]
    pub detailed_monitoring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_collected_at: Option<DateTime<Utc>>,
}

/// Activity tracking and auto-pause flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleState {
    #[serde(default)]
    pub detection_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused_by_system: bool,
}

/// Parameters for [`Worker::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateWorkerSpec {
    pub name: String,
    pub region: String,
    pub created_by: String,
    pub instance_type: Option<String>,
    pub image_id: Option<String>,
    pub image_name: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// Parameters for [`Worker::import_from_existing_instance`].
#[derive(Debug, Clone)]
pub struct ImportWorkerSpec {
    pub name: String,
    pub region: String,
    pub created_by: String,
    pub facts: CloudFacts,
    /// Cloud instance state name at discovery time (e.g. "running").
    pub cloud_state: String,
}

/// The central aggregate: one per managed VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    pub region: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub status: WorkerStatus,
    #[serde(default)]
    pub cloud: CloudFacts,
    #[serde(default)]
    pub cloud_health: CloudHealth,
    #[serde(default)]
    pub utilization: CloudUtilization,
    #[serde(default)]
    pub service: ServiceSnapshot,
    #[serde(default)]
    pub idle: IdleState,
    #[serde(skip)]
    pending: Vec<WorkerEvent>,
}

impl Worker {
    /// New worker entering the provisioning saga. Persist as PENDING before
    /// touching the cloud.
    pub fn create(spec: CreateWorkerSpec, now: DateTime<Utc>) -> Worker {
        let id = WorkerId::new();
        let mut worker = Worker::blank(id);
        worker.emit(WorkerEvent::Created {
            id,
            name: spec.name,
            region: spec.region,
            created_by: spec.created_by,
            created_at: now,
            instance_type: spec.instance_type,
            image_id: spec.image_id,
            image_name: spec.image_name,
            tags: spec.tags,
        });
        worker
    }

    /// Adopt an existing cloud instance.
    ///
    /// The worker is born IMPORTED and immediately settles into the status
    /// derived from the instance's cloud state. A terminated instance cannot
    /// be imported.
    pub fn import_from_existing_instance(
        spec: ImportWorkerSpec,
        now: DateTime<Utc>,
    ) -> Result<Worker, DomainError> {
        if spec.facts.instance_id.is_none() {
            return Err(DomainError::Validation(
                "import requires a cloud instance id".to_string(),
            ));
        }
        let derived = WorkerStatus::from_cloud_state(&spec.cloud_state).ok_or_else(|| {
            DomainError::Validation(format!("unrecognized cloud state '{}'", spec.cloud_state))
        })?;
        if derived == WorkerStatus::Terminated {
            return Err(DomainError::Validation(
                "cannot import a terminated instance".to_string(),
            ));
        }

        let id = WorkerId::new();
        let mut worker = Worker::blank(id);
        worker.emit(WorkerEvent::Imported {
            id,
            name: spec.name,
            region: spec.region,
            created_by: spec.created_by,
            created_at: now,
            facts: spec.facts,
        });
        if derived != WorkerStatus::Imported {
            worker.transition_to(derived, now)?;
        }
        Ok(worker)
    }

    /// Rebuild an aggregate from a recorded event sequence.
    ///
    /// The first event must be `Created` or `Imported`.
    pub fn from_events(events: &[WorkerEvent]) -> Option<Worker> {
        let first = events.first()?;
        let id = first.worker_id();
        if !matches!(
            first,
            WorkerEvent::Created { .. } | WorkerEvent::Imported { .. }
        ) {
            return None;
        }
        let mut worker = Worker::blank(id);
        for event in events {
            worker.apply(event);
        }
        Some(worker)
    }

    fn blank(id: WorkerId) -> Worker {
        Worker {
            id,
            name: String::new(),
            region: String::new(),
            created_at: DateTime::<Utc>::MIN_UTC,
            created_by: String::new(),
            status: WorkerStatus::Pending,
            cloud: CloudFacts::default(),
            cloud_health: CloudHealth::default(),
            utilization: CloudUtilization::default(),
            service: ServiceSnapshot::default(),
            idle: IdleState::default(),
            pending: Vec::new(),
        }
    }

    /// Drain events accumulated since the last drain. Called by the
    /// pipeline after a successful persist.
    pub fn take_events(&mut self) -> Vec<WorkerEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }

    fn emit(&mut self, event: WorkerEvent) {
        self.apply(&event);
        self.pending.push(event);
    }

    /// Attempt a lifecycle transition, rejecting edges outside the graph.
    pub fn transition_to(
        &mut self,
        to: WorkerStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::invalid_transition(self.status, to));
        }
        self.emit(WorkerEvent::StatusChanged {
            id: self.id,
            from: self.status,
            to,
            at: now,
        });
        Ok(())
    }

    /// Saga step 2: the cloud resource exists.
    pub fn record_provisioned(
        &mut self,
        cloud_instance_id: impl Into<String>,
        detailed_monitoring: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != WorkerStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, WorkerStatus::Provisioned));
        }
        if self.cloud.instance_id.is_some() {
            return Err(DomainError::Conflict(
                "cloud instance id already assigned".to_string(),
            ));
        }
        self.emit(WorkerEvent::Provisioned {
            id: self.id,
            cloud_instance_id: cloud_instance_id.into(),
            detailed_monitoring,
            at: now,
        });
        Ok(())
    }

    /// Saga compensation path: provisioning failed.
    pub fn record_provision_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.emit(WorkerEvent::ProvisionFailed {
            id: self.id,
            error: error.into(),
            at: now,
        });
    }

    /// Update the cloud health slot. Stale observations (older than the
    /// slot's last timestamp) are dropped without an event.
    pub fn update_cloud_health(
        &mut self,
        instance_state: Option<String>,
        system_status: Option<String>,
        at: DateTime<Utc>,
    ) {
        if self.cloud_health.last_checked_at.is_some_and(|cur| at < cur) {
            return;
        }
        self.emit(WorkerEvent::CloudHealthUpdated {
            id: self.id,
            instance_state,
            system_status,
            at,
        });
    }

    /// Update the cloud utilization slot, same staleness rule.
    pub fn update_cloud_utilization(
        &mut self,
        cpu_pct: Option<f64>,
        mem_pct: Option<f64>,
        detailed_monitoring: bool,
        at: DateTime<Utc>,
    ) {
        if self
            .utilization
            .last_collected_at
            .is_some_and(|cur| at < cur)
        {
            return;
        }
        self.emit(WorkerEvent::CloudUtilizationUpdated {
            id: self.id,
            cpu_pct,
            mem_pct,
            detailed_monitoring,
            at,
        });
    }

    /// Refresh VM facts from a describe call. The assigned instance id is
    /// immutable; the reducer keeps the existing one.
    pub fn update_cloud_facts(&mut self, facts: CloudFacts) {
        let mut next = facts;
        if let Some(existing) = &self.cloud.instance_id {
            next.instance_id = Some(existing.clone());
        }
        if next == self.cloud {
            return;
        }
        self.emit(WorkerEvent::CloudFactsUpdated {
            id: self.id,
            facts: next,
        });
    }

    pub fn update_tags(&mut self, tags: BTreeMap<String, String>, at: DateTime<Utc>) {
        if tags == self.cloud.tags {
            return;
        }
        self.emit(WorkerEvent::TagsUpdated {
            id: self.id,
            tags,
            at,
        });
    }

    /// Update the Service slot. Stale snapshots are dropped.
    pub fn update_service(&mut self, snapshot: ServiceSnapshot) {
        if let (Some(cur), Some(new)) = (self.service.last_synced_at, snapshot.last_synced_at) {
            if new < cur {
                return;
            }
        }
        self.emit(WorkerEvent::ServiceUpdated {
            id: self.id,
            snapshot,
        });
    }

    /// Record user activity. Monotonic: an older timestamp is a no-op.
    pub fn record_activity(&mut self, at: DateTime<Utc>) {
        if self.idle.last_activity_at.is_some_and(|cur| at <= cur) {
            return;
        }
        self.emit(WorkerEvent::ActivityObserved { id: self.id, at });
    }

    /// Toggle idle detection. Returns false when already in that state.
    pub fn set_idle_detection(&mut self, enabled: bool, at: DateTime<Utc>) -> bool {
        if self.idle.detection_enabled == enabled {
            return false;
        }
        self.emit(WorkerEvent::IdleDetectionSet {
            id: self.id,
            enabled,
            at,
        });
        true
    }

    /// Mark the worker as paused by idle detection.
    pub fn auto_pause(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.idle.detection_enabled {
            return Err(DomainError::Conflict(
                "idle detection is disabled".to_string(),
            ));
        }
        if self.idle.paused_by_system {
            return Err(DomainError::Conflict("already auto-paused".to_string()));
        }
        self.emit(WorkerEvent::AutoPaused { id: self.id, at });
        Ok(())
    }

    /// Clear the auto-pause flag (manual start or renewed activity).
    pub fn resume(&mut self, at: DateTime<Utc>) {
        if !self.idle.paused_by_system && self.idle.idle_since.is_none() {
            return;
        }
        self.emit(WorkerEvent::Resumed { id: self.id, at });
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Labs may only be refreshed on a running worker with a reachable
    /// Service.
    pub fn can_refresh_labs(&self) -> bool {
        self.status == WorkerStatus::Running && self.service.status == ServiceStatus::Available
    }

    /// Reducer: fold one event into the aggregate state.
    ///
    /// Handlers must stay idempotent — assignments over increments, clamps
    /// over blind writes — because commands pre-apply events before persist
    /// and tests replay drained sequences.
    pub fn apply(&mut self, event: &WorkerEvent) {
        match event {
            WorkerEvent::Created {
                id,
                name,
                region,
                created_by,
                created_at,
                instance_type,
                image_id,
                image_name,
                tags,
            } => {
                self.id = *id;
                self.name = name.clone();
                self.region = region.clone();
                self.created_by = created_by.clone();
                self.created_at = *created_at;
                self.status = WorkerStatus::Pending;
                self.cloud.instance_type = instance_type.clone();
                self.cloud.image_id = image_id.clone();
                self.cloud.image_name = image_name.clone();
                self.cloud.tags = tags.clone();
            }

            WorkerEvent::Provisioned {
                cloud_instance_id,
                detailed_monitoring,
                ..
            } => {
                if self.cloud.instance_id.is_none() {
                    self.cloud.instance_id = Some(cloud_instance_id.clone());
                }
                self.utilization.detailed_monitoring = *detailed_monitoring;
                self.status = WorkerStatus::Provisioned;
            }

            WorkerEvent::ProvisionFailed { .. } => {
                self.status = WorkerStatus::Failed;
            }

            WorkerEvent::Imported {
                id,
                name,
                region,
                created_by,
                created_at,
                facts,
            } => {
                self.id = *id;
                self.name = name.clone();
                self.region = region.clone();
                self.created_by = created_by.clone();
                self.created_at = *created_at;
                self.status = WorkerStatus::Imported;
                self.cloud = facts.clone();
            }

            WorkerEvent::StatusChanged { to, .. } => {
                self.status = *to;
            }

            WorkerEvent::CloudHealthUpdated {
                instance_state,
                system_status,
                at,
                ..
            } => {
                self.cloud_health.instance_state = instance_state.clone();
                self.cloud_health.system_status = system_status.clone();
                self.cloud_health.last_checked_at =
                    Some(self.cloud_health.last_checked_at.map_or(*at, |cur| cur.max(*at)));
            }

            WorkerEvent::CloudUtilizationUpdated {
                cpu_pct,
                mem_pct,
                detailed_monitoring,
                at,
                ..
            } => {
                self.utilization.cpu_pct = *cpu_pct;
                self.utilization.mem_pct = *mem_pct;
                self.utilization.detailed_monitoring = *detailed_monitoring;
                self.utilization.last_collected_at =
                    Some(self.utilization.last_collected_at.map_or(*at, |cur| cur.max(*at)));
            }

            WorkerEvent::CloudFactsUpdated { facts, .. } => {
                let keep = self.cloud.instance_id.clone();
                self.cloud = facts.clone();
                if keep.is_some() {
                    self.cloud.instance_id = keep;
                }
            }

            WorkerEvent::TagsUpdated { tags, .. } => {
                self.cloud.tags = tags.clone();
            }

            WorkerEvent::ServiceUpdated { snapshot, .. } => {
                let prev = self.service.last_synced_at;
                self.service = snapshot.clone();
                if let (Some(cur), Some(new)) = (prev, snapshot.last_synced_at) {
                    self.service.last_synced_at = Some(cur.max(new));
                }
            }

            WorkerEvent::ActivityObserved { at, .. } => {
                self.idle.last_activity_at =
                    Some(self.idle.last_activity_at.map_or(*at, |cur| cur.max(*at)));
                self.idle.idle_since = None;
            }

            WorkerEvent::IdleDetectionSet { enabled, .. } => {
                self.idle.detection_enabled = *enabled;
                if !enabled {
                    self.idle.idle_since = None;
                }
            }

            WorkerEvent::AutoPaused { at, .. } => {
                self.idle.paused_by_system = true;
                if self.idle.idle_since.is_none() {
                    self.idle.idle_since = Some(*at);
                }
            }

            WorkerEvent::Resumed { .. } => {
                self.idle.paused_by_system = false;
                self.idle.idle_since = None;
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
