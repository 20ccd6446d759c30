// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::http_status;
use labfleet_core::test_support::{lab_obs, t0, WorkerBuilder};
use labfleet_core::{OperationStatus, ServiceSnapshot, WorkerId};
use yare::parameterized;

#[test]
fn worker_dto_projects_aggregate_fields() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    worker.update_service(ServiceSnapshot {
        status: labfleet_core::ServiceStatus::Available,
        version: Some("2.7.0".to_string()),
        ready: true,
        labs_count: Some(4),
        last_synced_at: Some(t0()),
        ..Default::default()
    });

    let dto = WorkerDto::from(&worker);
    assert_eq!(dto.id, worker.id.to_string());
    assert_eq!(dto.name, "w1");
    assert_eq!(dto.status, WorkerStatus::Running);
    assert_eq!(dto.cloud_instance_id.as_deref(), Some("i-test"));
    assert_eq!(dto.service_version.as_deref(), Some("2.7.0"));
    assert_eq!(dto.labs_count, Some(4));
}

#[test]
fn metrics_dto_reflects_all_three_slots() {
    let mut worker = WorkerBuilder::new("w1").running().build();
    worker.update_cloud_health(Some("running".into()), Some("ok".into()), t0());
    worker.update_cloud_utilization(Some(33.0), Some(50.0), true, t0());

    let dto = WorkerMetricsDto::from(&worker);
    assert_eq!(dto.instance_state.as_deref(), Some("running"));
    assert_eq!(dto.cpu_pct, Some(33.0));
    assert!(dto.detailed_monitoring);
    assert!(dto.service_synced_at.is_none());
}

#[test]
fn lab_dto_reports_history_length() {
    let mut lab = LabRecord::from_observation(WorkerId::new(), &lab_obs("lab-1", "BGP", "STARTED"), t0());
    let _ = lab.update_from_service(&lab_obs("lab-1", "BGP v2", "STARTED"), t0());
    let dto = LabDto::from(&lab);
    assert_eq!(dto.lab_id, "lab-1");
    assert_eq!(dto.history_len, 1);
}

#[parameterized(
    ok = { OperationStatus::Ok, 200 },
    bad_request = { OperationStatus::BadRequest, 400 },
    not_found = { OperationStatus::NotFound, 404 },
    conflict = { OperationStatus::Conflict, 409 },
    failed_dependency = { OperationStatus::FailedDependency, 424 },
    internal = { OperationStatus::Internal, 500 },
)]
fn status_maps_to_http(status: OperationStatus, code: u16) {
    assert_eq!(http_status(status), code);
}
