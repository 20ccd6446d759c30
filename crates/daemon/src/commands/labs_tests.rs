// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::mediator::Command;
use crate::test_support::{drain_envelopes, harness, kinds, TestHarness};
use labfleet_adapters::{IntegrationError, ServiceCall};
use labfleet_core::test_support::lab_obs;
use labfleet_core::{Clock, OperationStatus, ServiceSnapshot, ServiceStatus, Worker, WorkerStatus};
use labfleet_wire::kind;

/// A running worker whose Service is AVAILABLE.
fn refreshable_worker(h: &TestHarness) -> Worker {
    let mut worker = h.insert_worker("w1", "i-1", WorkerStatus::Running);
    worker.update_service(ServiceSnapshot {
        status: ServiceStatus::Available,
        last_synced_at: Some(h.clock.now_utc()),
        ..Default::default()
    });
    let _ = worker.take_events();
    if let Err(err) = h.ctx.store.upsert_worker(&worker) {
        unreachable!("refreshable_worker: {err}");
    }
    worker
}

#[tokio::test]
async fn refresh_is_a_noop_unless_running_and_available() {
    let h = harness();
    // Running but service UNKNOWN
    let running = h.insert_worker("w1", "i-1", WorkerStatus::Running);
    let result = h
        .dispatch(Command::RefreshWorkerLabs {
            worker_id: running.id,
        })
        .await;
    assert!(result.is_ok());
    assert_eq!(result.data.unwrap()["skipped"], true);
    assert!(h.service().calls().is_empty());

    // Service available but worker stopped
    let mut stopped = h.insert_worker("w2", "i-2", WorkerStatus::Stopped);
    stopped.update_service(ServiceSnapshot {
        status: ServiceStatus::Available,
        last_synced_at: Some(h.clock.now_utc()),
        ..Default::default()
    });
    let _ = stopped.take_events();
    h.ctx.store.upsert_worker(&stopped).unwrap();
    let result = h
        .dispatch(Command::RefreshWorkerLabs {
            worker_id: stopped.id,
        })
        .await;
    assert_eq!(result.data.unwrap()["skipped"], true);
}

#[tokio::test]
async fn first_refresh_creates_records_and_emits() {
    let h = harness();
    let worker = refreshable_worker(&h);
    let mut rx = h.subscribe();
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));

    let result = h
        .dispatch(Command::RefreshWorkerLabs {
            worker_id: worker.id,
        })
        .await;
    assert!(result.is_ok());

    let labs = h.ctx.store.labs_for_worker(worker.id);
    assert_eq!(labs.len(), 1);
    assert_eq!(labs[0].lab_id, "lab-1");
    assert!(labs[0].operation_history.is_empty());

    let envelopes = drain_envelopes(&mut rx);
    assert!(kinds(&envelopes).contains(&kind::LAB_CREATED.to_string()));
    // Labs count flowed onto the worker
    assert_eq!(
        h.ctx.store.get_worker(worker.id).unwrap().service.labs_count,
        Some(1)
    );
}

#[tokio::test]
async fn changed_lab_gets_history_and_update_event() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    h.clock.advance(std::time::Duration::from_secs(120));
    let mut rx = h.subscribe();
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STOPPED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    let lab = h.ctx.store.get_lab(worker.id, "lab-1").unwrap();
    assert_eq!(lab.state, "STOPPED");
    assert_eq!(lab.operation_history.len(), 1);
    assert!(kinds(&drain_envelopes(&mut rx)).contains(&kind::LAB_UPDATED.to_string()));
}

#[tokio::test]
async fn unchanged_lab_gets_no_history_entry() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    h.clock.advance(std::time::Duration::from_secs(120));
    let mut rx = h.subscribe();
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    let lab = h.ctx.store.get_lab(worker.id, "lab-1").unwrap();
    assert!(lab.operation_history.is_empty());
    // Sync time still advanced
    assert_eq!(lab.last_synced_at, h.clock.now_utc());
    assert!(!kinds(&drain_envelopes(&mut rx)).contains(&kind::LAB_UPDATED.to_string()));
}

#[tokio::test]
async fn orphans_are_removed_with_deleted_envelopes() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service().set_labs(Ok(vec![
        lab_obs("a", "A", "STARTED"),
        lab_obs("b", "B", "STARTED"),
        lab_obs("c", "C", "STARTED"),
    ]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;
    assert_eq!(h.ctx.store.labs_for_worker(worker.id).len(), 3);

    h.clock.advance(std::time::Duration::from_secs(120));
    let mut rx = h.subscribe();
    h.service()
        .set_labs(Ok(vec![lab_obs("a", "A", "STARTED"), lab_obs("c", "C", "STARTED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    let remaining: Vec<String> = h.ctx.store.lab_ids_for_worker(worker.id);
    assert_eq!(remaining, vec!["a".to_string(), "c".to_string()]);

    let envelopes = drain_envelopes(&mut rx);
    let deleted: Vec<_> = envelopes
        .iter()
        .filter(|e| e.kind == kind::LAB_DELETED)
        .collect();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].data["lab_id"], "b");
    // Unchanged survivors got no history entries
    assert!(h.ctx.store.get_lab(worker.id, "a").unwrap().operation_history.is_empty());
}

#[tokio::test]
async fn list_failure_is_failed_dependency() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service()
        .set_labs(Err(IntegrationError::timeout("labs timed out")));

    let result = h
        .dispatch(Command::RefreshWorkerLabs {
            worker_id: worker.id,
        })
        .await;
    assert_eq!(result.status, OperationStatus::FailedDependency);
}

#[tokio::test]
async fn delete_lab_two_phase_removes_local_record() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    let mut rx = h.subscribe();
    let result = h
        .dispatch(Command::DeleteLab {
            worker_id: worker.id,
            lab_id: "lab-1".to_string(),
        })
        .await;
    assert!(result.is_ok());
    assert!(h.ctx.store.get_lab(worker.id, "lab-1").is_none());
    assert!(h
        .service()
        .calls()
        .contains(&ServiceCall::DeleteLab("lab-1".to_string())));
    assert!(kinds(&drain_envelopes(&mut rx)).contains(&kind::LAB_DELETED.to_string()));
}

#[tokio::test]
async fn deleted_lab_stays_gone_after_refresh() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    h.dispatch(Command::DeleteLab {
        worker_id: worker.id,
        lab_id: "lab-1".to_string(),
    })
    .await;

    // The Service no longer lists it either
    h.service().set_labs(Ok(vec![]));
    h.clock.advance(std::time::Duration::from_secs(120));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;
    assert!(h.ctx.store.get_lab(worker.id, "lab-1").is_none());

    // Unless the Service lists it again, in which case it reappears
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));
    h.clock.advance(std::time::Duration::from_secs(120));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;
    assert!(h.ctx.store.get_lab(worker.id, "lab-1").is_some());
}

#[tokio::test]
async fn delete_lab_service_failure_keeps_local_record() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    h.service().set_delete_result(
        "lab-1",
        Err(IntegrationError::timeout("delete timed out")),
    );
    let result = h
        .dispatch(Command::DeleteLab {
            worker_id: worker.id,
            lab_id: "lab-1".to_string(),
        })
        .await;
    assert_eq!(result.status, OperationStatus::FailedDependency);
    assert!(h.ctx.store.get_lab(worker.id, "lab-1").is_some());
}

#[tokio::test]
async fn delete_lab_absent_on_service_still_cleans_up() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;

    h.service()
        .set_delete_result("lab-1", Err(IntegrationError::not_found("gone")));
    let result = h
        .dispatch(Command::DeleteLab {
            worker_id: worker.id,
            lab_id: "lab-1".to_string(),
        })
        .await;
    assert!(result.is_ok());
    assert!(h.ctx.store.get_lab(worker.id, "lab-1").is_none());
}

#[tokio::test]
async fn delete_unknown_lab_is_not_found() {
    let h = harness();
    let worker = refreshable_worker(&h);
    let result = h
        .dispatch(Command::DeleteLab {
            worker_id: worker.id,
            lab_id: "ghost".to_string(),
        })
        .await;
    assert_eq!(result.status, OperationStatus::NotFound);
}

#[tokio::test]
async fn labs_refresh_records_activity() {
    let h = harness();
    let worker = refreshable_worker(&h);
    h.service()
        .set_labs(Ok(vec![lab_obs("lab-1", "BGP", "STARTED")]));
    h.dispatch(Command::RefreshWorkerLabs {
        worker_id: worker.id,
    })
    .await;
    assert_eq!(
        h.ctx
            .store
            .get_worker(worker.id)
            .unwrap()
            .idle
            .last_activity_at,
        Some(h.clock.now_utc())
    );
}
