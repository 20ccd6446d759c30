// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and helpers for tests in this crate and downstream crates.
//! Compiled only for tests or with the `test-support` feature.

use crate::lab::LabObservation;
use crate::worker::{CloudFacts, CreateWorkerSpec, ImportWorkerSpec, Worker, WorkerStatus};
use chrono::{DateTime, TimeZone, Utc};

/// A deterministic timestamp for tests.
pub fn t0() -> DateTime<Utc> {
    match Utc.timestamp_opt(1_700_000_000, 0).single() {
        Some(t) => t,
        None => Utc::now(),
    }
}

/// Builder for workers in arbitrary lifecycle states.
pub struct WorkerBuilder {
    spec: CreateWorkerSpec,
    status: WorkerStatus,
    instance_id: Option<String>,
    idle_detection: bool,
}

impl WorkerBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            spec: CreateWorkerSpec {
                name: name.to_string(),
                region: "r1".to_string(),
                created_by: "tester".to_string(),
                instance_type: Some("t3.large".to_string()),
                image_id: Some("img-1".to_string()),
                image_name: None,
                tags: Default::default(),
            },
            status: WorkerStatus::Pending,
            instance_id: None,
            idle_detection: false,
        }
    }

    pub fn region(mut self, region: &str) -> Self {
        self.spec.region = region.to_string();
        self
    }

    pub fn running(mut self) -> Self {
        self.status = WorkerStatus::Running;
        self.instance_id = Some("i-test".to_string());
        self
    }

    pub fn stopped(mut self) -> Self {
        self.status = WorkerStatus::Stopped;
        self.instance_id = Some("i-test".to_string());
        self
    }

    pub fn instance_id(mut self, id: &str) -> Self {
        self.instance_id = Some(id.to_string());
        self
    }

    pub fn idle_detection(mut self, enabled: bool) -> Self {
        self.idle_detection = enabled;
        self
    }

    /// Drive the worker through legal transitions to the target status.
    pub fn build(self) -> Worker {
        let now = t0();
        let mut worker = Worker::create(self.spec, now);
        if let Some(instance_id) = &self.instance_id {
            let _ = worker.record_provisioned(instance_id.clone(), false, now);
        }
        let path: &[WorkerStatus] = match self.status {
            WorkerStatus::Pending | WorkerStatus::Provisioned => &[],
            WorkerStatus::Running => &[WorkerStatus::Running],
            WorkerStatus::Stopping => &[WorkerStatus::Running, WorkerStatus::Stopping],
            WorkerStatus::Stopped => &[
                WorkerStatus::Running,
                WorkerStatus::Stopping,
                WorkerStatus::Stopped,
            ],
            WorkerStatus::Starting => &[
                WorkerStatus::Running,
                WorkerStatus::Stopping,
                WorkerStatus::Stopped,
                WorkerStatus::Starting,
            ],
            WorkerStatus::Terminating => &[WorkerStatus::Terminating],
            WorkerStatus::Terminated => &[WorkerStatus::Terminating, WorkerStatus::Terminated],
            WorkerStatus::Failed | WorkerStatus::Imported => &[],
        };
        for status in path {
            let _ = worker.transition_to(*status, now);
        }
        if self.idle_detection {
            worker.set_idle_detection(true, now);
        }
        let _ = worker.take_events();
        worker
    }
}

/// A worker imported from a running instance.
pub fn imported_worker(name: &str, instance_id: &str) -> Worker {
    let spec = ImportWorkerSpec {
        name: name.to_string(),
        region: "r1".to_string(),
        created_by: "tester".to_string(),
        facts: CloudFacts {
            instance_id: Some(instance_id.to_string()),
            instance_type: Some("t3.large".to_string()),
            ..Default::default()
        },
        cloud_state: "running".to_string(),
    };
    match Worker::import_from_existing_instance(spec, t0()) {
        Ok(mut worker) => {
            let _ = worker.take_events();
            worker
        }
        Err(err) => unreachable!("imported_worker builder: {err}"),
    }
}

/// A minimal lab observation.
pub fn lab_obs(lab_id: &str, title: &str, state: &str) -> LabObservation {
    LabObservation {
        lab_id: lab_id.to_string(),
        title: title.to_string(),
        state: state.to_string(),
        node_count: 2,
        link_count: 1,
        ..Default::default()
    }
}
