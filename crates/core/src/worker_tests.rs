// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{t0, WorkerBuilder};
use chrono::Duration;
use yare::parameterized;

fn create_spec(name: &str) -> CreateWorkerSpec {
    CreateWorkerSpec {
        name: name.to_string(),
        region: "r1".to_string(),
        created_by: "alice".to_string(),
        instance_type: Some("t3.large".to_string()),
        image_id: Some("img-1".to_string()),
        image_name: None,
        tags: BTreeMap::new(),
    }
}

#[test]
fn create_starts_pending_with_created_event() {
    let mut worker = Worker::create(create_spec("w1"), t0());
    assert_eq!(worker.status, WorkerStatus::Pending);
    assert_eq!(worker.name, "w1");
    assert!(worker.cloud.instance_id.is_none());

    let events = worker.take_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], WorkerEvent::Created { .. }));
    assert!(!worker.has_pending_events());
}

#[test]
fn provisioning_assigns_instance_id_once() {
    let mut worker = Worker::create(create_spec("w1"), t0());
    worker.record_provisioned("i-1", false, t0()).unwrap();
    assert_eq!(worker.status, WorkerStatus::Provisioned);
    assert_eq!(worker.cloud.instance_id.as_deref(), Some("i-1"));

    // Second assignment is a conflict without mutation
    let err = worker.record_provisioned("i-2", true, t0()).unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    assert_eq!(worker.cloud.instance_id.as_deref(), Some("i-1"));
}

#[test]
fn provision_failure_marks_failed() {
    let mut worker = Worker::create(create_spec("w1"), t0());
    worker.record_provision_failed("quota exceeded", t0());
    assert_eq!(worker.status, WorkerStatus::Failed);
}

#[parameterized(
    pending_to_provisioned = { WorkerStatus::Pending, WorkerStatus::Provisioned, true },
    pending_to_failed = { WorkerStatus::Pending, WorkerStatus::Failed, true },
    provisioned_to_running = { WorkerStatus::Provisioned, WorkerStatus::Running, true },
    running_to_stopping = { WorkerStatus::Running, WorkerStatus::Stopping, true },
    stopping_to_stopped = { WorkerStatus::Stopping, WorkerStatus::Stopped, true },
    stopped_to_starting = { WorkerStatus::Stopped, WorkerStatus::Starting, true },
    starting_to_running = { WorkerStatus::Starting, WorkerStatus::Running, true },
    running_to_terminating = { WorkerStatus::Running, WorkerStatus::Terminating, true },
    failed_to_terminating = { WorkerStatus::Failed, WorkerStatus::Terminating, true },
    terminating_to_terminated = { WorkerStatus::Terminating, WorkerStatus::Terminated, true },
    running_to_stopped_skips_stopping = { WorkerStatus::Running, WorkerStatus::Stopped, false },
    stopped_to_running_skips_starting = { WorkerStatus::Stopped, WorkerStatus::Running, false },
    pending_to_running = { WorkerStatus::Pending, WorkerStatus::Running, false },
    terminated_to_starting = { WorkerStatus::Terminated, WorkerStatus::Starting, false },
    terminated_to_terminating = { WorkerStatus::Terminated, WorkerStatus::Terminating, false },
)]
fn transition_graph(from: WorkerStatus, to: WorkerStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn invalid_transition_leaves_state_untouched() {
    let mut worker = WorkerBuilder::new("w1").stopped().build();
    let err = worker
        .transition_to(WorkerStatus::Running, t0())
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
    assert_eq!(worker.status, WorkerStatus::Stopped);
    assert!(!worker.has_pending_events());
}

#[test]
fn cloud_health_timestamps_are_monotonic() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    let later = t0() + Duration::seconds(60);
    worker.update_cloud_health(Some("running".into()), Some("ok".into()), later);
    assert_eq!(worker.cloud_health.last_checked_at, Some(later));

    // A stale observation is dropped entirely
    worker.update_cloud_health(Some("stopped".into()), None, t0());
    assert_eq!(worker.cloud_health.instance_state.as_deref(), Some("running"));
    assert_eq!(worker.cloud_health.last_checked_at, Some(later));
}

#[test]
fn utilization_slot_is_independent_of_health_slot() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    let later = t0() + Duration::seconds(30);
    worker.update_cloud_utilization(Some(42.5), Some(61.0), true, later);
    assert_eq!(worker.utilization.cpu_pct, Some(42.5));
    assert_eq!(worker.utilization.last_collected_at, Some(later));
    // Health slot untouched
    assert!(worker.cloud_health.last_checked_at.is_none());
}

#[test]
fn facts_update_preserves_assigned_instance_id() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    let facts = CloudFacts {
        instance_id: Some("i-other".to_string()),
        public_ip: Some("203.0.113.9".to_string()),
        ..Default::default()
    };
    worker.update_cloud_facts(facts);
    assert_eq!(worker.cloud.instance_id.as_deref(), Some("i-test"));
    assert_eq!(worker.cloud.public_ip.as_deref(), Some("203.0.113.9"));
}

#[test]
fn service_snapshot_stale_sync_dropped() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    let later = t0() + Duration::seconds(120);
    worker.update_service(ServiceSnapshot {
        status: ServiceStatus::Available,
        version: Some("2.7.0".to_string()),
        ready: true,
        labs_count: Some(3),
        last_synced_at: Some(later),
        ..Default::default()
    });
    worker.update_service(ServiceSnapshot {
        status: ServiceStatus::Unavailable,
        last_synced_at: Some(t0()),
        ..Default::default()
    });
    assert_eq!(worker.service.status, ServiceStatus::Available);
    assert_eq!(worker.service.last_synced_at, Some(later));
}

#[parameterized(
    running = { "running", Some(WorkerStatus::Running) },
    pending = { "pending", Some(WorkerStatus::Starting) },
    stopping = { "stopping", Some(WorkerStatus::Stopping) },
    stopped = { "stopped", Some(WorkerStatus::Stopped) },
    shutting_down = { "shutting-down", Some(WorkerStatus::Terminating) },
    terminated = { "terminated", Some(WorkerStatus::Terminated) },
    unknown = { "rebooting", None },
)]
fn cloud_state_mapping(state: &str, expected: Option<WorkerStatus>) {
    assert_eq!(WorkerStatus::from_cloud_state(state), expected);
}

#[test]
fn import_derives_status_from_cloud_state() {
    let spec = ImportWorkerSpec {
        name: "adopted".to_string(),
        region: "r1".to_string(),
        created_by: "alice".to_string(),
        facts: CloudFacts {
            instance_id: Some("i-9".to_string()),
            ..Default::default()
        },
        cloud_state: "stopped".to_string(),
    };
    let mut worker = Worker::import_from_existing_instance(spec, t0()).unwrap();
    assert_eq!(worker.status, WorkerStatus::Stopped);

    let events = worker.take_events();
    assert!(matches!(events[0], WorkerEvent::Imported { .. }));
    assert!(matches!(
        events[1],
        WorkerEvent::StatusChanged {
            to: WorkerStatus::Stopped,
            ..
        }
    ));
}

#[test]
fn import_rejects_terminated_instance() {
    let spec = ImportWorkerSpec {
        name: "gone".to_string(),
        region: "r1".to_string(),
        created_by: "alice".to_string(),
        facts: CloudFacts {
            instance_id: Some("i-9".to_string()),
            ..Default::default()
        },
        cloud_state: "terminated".to_string(),
    };
    let err = Worker::import_from_existing_instance(spec, t0()).unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
}

#[test]
fn import_requires_instance_id() {
    let spec = ImportWorkerSpec {
        name: "ghost".to_string(),
        region: "r1".to_string(),
        created_by: "alice".to_string(),
        facts: CloudFacts::default(),
        cloud_state: "running".to_string(),
    };
    assert!(Worker::import_from_existing_instance(spec, t0()).is_err());
}

#[test]
fn auto_pause_requires_enabled_detection() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    assert!(worker.auto_pause(t0()).is_err());

    worker.set_idle_detection(true, t0());
    worker.auto_pause(t0()).unwrap();
    assert!(worker.idle.paused_by_system);
    assert_eq!(worker.idle.idle_since, Some(t0()));

    // Pausing twice is a conflict
    assert!(worker.auto_pause(t0()).is_err());
}

#[test]
fn activity_clears_idle_since_and_is_monotonic() {
    let mut worker = WorkerBuilder::new("w1").running().idle_detection(true).build();
    worker.auto_pause(t0()).unwrap();
    let later = t0() + Duration::seconds(10);
    worker.record_activity(later);
    assert_eq!(worker.idle.last_activity_at, Some(later));
    assert!(worker.idle.idle_since.is_none());

    // Older activity is a no-op
    worker.record_activity(t0());
    assert_eq!(worker.idle.last_activity_at, Some(later));
}

#[test]
fn resume_clears_pause_flags() {
    let mut worker = WorkerBuilder::new("w1").running().idle_detection(true).build();
    worker.auto_pause(t0()).unwrap();
    worker.resume(t0() + Duration::seconds(5));
    assert!(!worker.idle.paused_by_system);
    assert!(worker.idle.idle_since.is_none());
}

#[test]
fn set_idle_detection_is_a_noop_when_unchanged() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    assert!(worker.set_idle_detection(true, t0()));
    let _ = worker.take_events();
    assert!(!worker.set_idle_detection(true, t0()));
    assert!(!worker.has_pending_events());
}

#[test]
fn can_refresh_labs_requires_running_and_available() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    assert!(!worker.can_refresh_labs());
    worker.update_service(ServiceSnapshot {
        status: ServiceStatus::Available,
        last_synced_at: Some(t0()),
        ..Default::default()
    });
    assert!(worker.can_refresh_labs());

    let mut stopped = WorkerBuilder::new("w2").stopped().build();
    stopped.update_service(ServiceSnapshot {
        status: ServiceStatus::Available,
        last_synced_at: Some(t0()),
        ..Default::default()
    });
    assert!(!stopped.can_refresh_labs());
}

#[test]
fn replaying_drained_events_rebuilds_equal_state() {
    let mut worker = Worker::create(create_spec("w1"), t0());
    worker.record_provisioned("i-1", false, t0()).unwrap();
    worker
        .transition_to(WorkerStatus::Running, t0() + Duration::seconds(1))
        .unwrap();
    worker.update_cloud_health(Some("running".into()), Some("ok".into()), t0() + Duration::seconds(2));
    worker.update_cloud_utilization(Some(12.0), None, false, t0() + Duration::seconds(3));
    worker.set_idle_detection(true, t0() + Duration::seconds(4));
    worker.update_service(ServiceSnapshot {
        status: ServiceStatus::Available,
        version: Some("2.7.0".to_string()),
        ready: true,
        labs_count: Some(1),
        last_synced_at: Some(t0() + Duration::seconds(5)),
        ..Default::default()
    });

    let events = worker.take_events();
    let rebuilt = Worker::from_events(&events).unwrap();
    assert_eq!(rebuilt, worker);
}

#[test]
fn from_events_rejects_sequences_not_starting_with_creation() {
    let events = vec![WorkerEvent::ActivityObserved {
        id: WorkerId::new(),
        at: t0(),
    }];
    assert!(Worker::from_events(&events).is_none());
}
