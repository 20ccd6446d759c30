// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Labs reconciliation and two-phase lab deletion.

use super::{cancelled, load_worker, with_cancel};
use crate::context::FleetContext;
use crate::fanout::{publish_events, publish_sync_failed};
use labfleet_core::{
    Clock, DomainEvent, LabEvent, LabRecord, OperationResult, ServiceSnapshot, WorkerId,
};
use labfleet_wire::LabDto;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

/// Reconcile the local lab projections against the Service's list.
///
/// A no-op unless the worker is RUNNING with an AVAILABLE Service. New labs
/// are created, changed labs updated with change detection, and labs the
/// Service no longer lists are removed as orphans.
pub(crate) async fn handle_refresh_labs<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    cancel: &CancellationToken,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    if !worker.can_refresh_labs() {
        return OperationResult::ok(Some(serde_json::json!({
            "skipped": true,
            "status": worker.status,
            "service_status": worker.service.status,
        })));
    }
    let Some(endpoint) = ctx.service_endpoint(&worker) else {
        return OperationResult::conflict("worker has no address");
    };
    let client = ctx.services.for_endpoint(&endpoint);

    let observations = match with_cancel(cancel, client.list_labs()).await {
        Some(Ok(labs)) => labs,
        Some(Err(err)) => {
            publish_sync_failed(&ctx.bus, worker_id, ctx.clock.now_utc(), "labs", &err.to_string());
            return OperationResult::failed_dependency("service", err.to_string());
        }
        None => return cancelled(),
    };

    let now = ctx.clock.now_utc();
    let known: BTreeSet<String> = ctx.store.lab_ids_for_worker(worker_id).into_iter().collect();
    let current: BTreeSet<String> = observations
        .iter()
        .map(|obs| obs.lab_id.clone())
        .collect();

    let mut events: Vec<DomainEvent> = Vec::new();
    for obs in &observations {
        match ctx.store.get_lab(worker_id, &obs.lab_id) {
            Some(mut lab) => {
                if let Some(entry) = lab.update_from_service(obs, now) {
                    ctx.store.upsert_lab(&lab);
                    events.push(
                        LabEvent::Updated {
                            worker_id,
                            lab_id: lab.lab_id.clone(),
                            entry,
                        }
                        .into(),
                    );
                } else {
                    // Only the sync timestamp moved; no history entry
                    ctx.store.upsert_lab(&lab);
                }
            }
            None => {
                let lab = LabRecord::from_observation(worker_id, obs, now);
                ctx.store.upsert_lab(&lab);
                events.push(
                    LabEvent::Created {
                        worker_id,
                        lab_id: lab.lab_id.clone(),
                        title: lab.title.clone(),
                        state: lab.state.clone(),
                        at: now,
                    }
                    .into(),
                );
            }
        }
    }

    // Orphans: still local, no longer listed by the Service
    for orphan in known.difference(&current) {
        if ctx.store.remove_lab(worker_id, orphan) {
            events.push(
                LabEvent::Deleted {
                    worker_id,
                    lab_id: orphan.clone(),
                    at: now,
                }
                .into(),
            );
        }
    }

    publish_events(&ctx.bus, now, &events);

    // The refresh is also the activity signal: labs running means in use
    if !observations.is_empty() {
        worker.record_activity(now);
    }
    worker.update_service(ServiceSnapshot {
        labs_count: Some(observations.len() as u32),
        last_synced_at: Some(now),
        ..worker.service.clone()
    });
    match ctx.persist_and_publish(&mut worker) {
        Ok(significant) => {
            if significant {
                ctx.publish_snapshot(&worker);
            }
        }
        Err(err) => return OperationResult::internal(err.to_string()),
    }

    let labs: Vec<LabDto> = ctx
        .store
        .labs_for_worker(worker_id)
        .iter()
        .map(LabDto::from)
        .collect();
    OperationResult::ok(serde_json::to_value(&labs).ok())
}

/// Two-phase delete: the Service is authoritative. Once it confirms the
/// delete, the local record goes immediately; if the local remove finds
/// nothing, the next refresh is the safety net.
pub(crate) async fn handle_delete_lab<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    lab_id: &str,
    cancel: &CancellationToken,
) -> OperationResult {
    let worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    if ctx.store.get_lab(worker_id, lab_id).is_none() {
        return OperationResult::not_found(format!("lab {lab_id} not found"));
    }
    let Some(endpoint) = ctx.service_endpoint(&worker) else {
        return OperationResult::conflict("worker has no address");
    };
    let client = ctx.services.for_endpoint(&endpoint);

    match with_cancel(cancel, client.delete_lab(lab_id)).await {
        Some(Ok(())) => {}
        // Already gone on the Service: treat as deleted and clean up locally
        Some(Err(err)) if err.kind == labfleet_adapters::IntegrationErrorKind::NotFound => {
            tracing::debug!(worker = %worker_id, lab = lab_id, "lab already absent on service");
        }
        Some(Err(err)) => return OperationResult::failed_dependency("service", err.to_string()),
        None => return cancelled(),
    }

    let now = ctx.clock.now_utc();
    if !ctx.store.remove_lab(worker_id, lab_id) {
        // Service-side delete succeeded; reconciliation will converge
        tracing::warn!(
            worker = %worker_id,
            lab = lab_id,
            "lab deleted on service but local record was already gone"
        );
    }
    publish_events(
        &ctx.bus,
        now,
        &[LabEvent::Deleted {
            worker_id,
            lab_id: lab_id.to_string(),
            at: now,
        }
        .into()],
    );
    OperationResult::ok_empty()
}

#[cfg(test)]
#[path = "labs_tests.rs"]
mod tests;
