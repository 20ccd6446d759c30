// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle commands: start, stop, terminate, tag updates.
//!
//! Each validates the status transition before touching the cloud, so an
//! invalid request is rejected without side effects. The adapter call comes
//! before the local transition: the projection only moves once the provider
//! accepted the request.

use super::{cancelled, load_worker, persist_ok, with_cancel};
use crate::context::FleetContext;
use labfleet_core::{Clock, DomainError, OperationResult, WorkerId, WorkerStatus};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

pub(crate) async fn handle_start<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    cancel: &CancellationToken,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    if !worker.status.can_transition_to(WorkerStatus::Starting) {
        return OperationResult::from(DomainError::invalid_transition(
            worker.status,
            WorkerStatus::Starting,
        ));
    }
    let Some(instance_id) = worker.cloud.instance_id.clone() else {
        return OperationResult::conflict("worker has no cloud instance");
    };

    match with_cancel(cancel, ctx.cloud.start_instance(&worker.region, &instance_id)).await {
        Some(Ok(())) => {}
        Some(Err(err)) => return OperationResult::failed_dependency("cloud", err.to_string()),
        None => return cancelled(),
    }

    let now = ctx.clock.now_utc();
    if let Err(err) = worker.transition_to(WorkerStatus::Starting, now) {
        return OperationResult::from(err);
    }
    // A manual start always clears the auto-pause flags
    worker.resume(now);
    persist_ok(ctx, &mut worker)
}

pub(crate) async fn handle_stop<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    cancel: &CancellationToken,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    if !worker.status.can_transition_to(WorkerStatus::Stopping) {
        return OperationResult::from(DomainError::invalid_transition(
            worker.status,
            WorkerStatus::Stopping,
        ));
    }
    let Some(instance_id) = worker.cloud.instance_id.clone() else {
        return OperationResult::conflict("worker has no cloud instance");
    };

    match with_cancel(cancel, ctx.cloud.stop_instance(&worker.region, &instance_id)).await {
        Some(Ok(())) => {}
        Some(Err(err)) => return OperationResult::failed_dependency("cloud", err.to_string()),
        None => return cancelled(),
    }

    if let Err(err) = worker.transition_to(WorkerStatus::Stopping, ctx.clock.now_utc()) {
        return OperationResult::from(err);
    }
    persist_ok(ctx, &mut worker)
}

/// Persists TERMINATING; the next metrics sync observes the instance gone
/// and completes the transition to TERMINATED.
pub(crate) async fn handle_terminate<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    cancel: &CancellationToken,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    if !worker.status.can_transition_to(WorkerStatus::Terminating) {
        return OperationResult::from(DomainError::invalid_transition(
            worker.status,
            WorkerStatus::Terminating,
        ));
    }

    let now = ctx.clock.now_utc();
    match worker.cloud.instance_id.clone() {
        Some(instance_id) => {
            match with_cancel(
                cancel,
                ctx.cloud.terminate_instance(&worker.region, &instance_id),
            )
            .await
            {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    return OperationResult::failed_dependency("cloud", err.to_string())
                }
                None => return cancelled(),
            }
            if let Err(err) = worker.transition_to(WorkerStatus::Terminating, now) {
                return OperationResult::from(err);
            }
        }
        None => {
            // Nothing in the cloud to wait for
            if let Err(err) = worker.transition_to(WorkerStatus::Terminating, now) {
                return OperationResult::from(err);
            }
            if let Err(err) = worker.transition_to(WorkerStatus::Terminated, now) {
                return OperationResult::from(err);
            }
        }
    }

    let result = persist_ok(ctx, &mut worker);
    ctx.throttle.forget(worker_id);
    result
}

pub(crate) async fn handle_update_tags<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    tags: BTreeMap<String, String>,
    cancel: &CancellationToken,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    let Some(instance_id) = worker.cloud.instance_id.clone() else {
        return OperationResult::conflict("worker has no cloud instance");
    };

    match with_cancel(cancel, ctx.cloud.set_tags(&worker.region, &instance_id, &tags)).await {
        Some(Ok(())) => {}
        Some(Err(err)) => return OperationResult::failed_dependency("cloud", err.to_string()),
        None => return cancelled(),
    }

    worker.update_tags(tags, ctx.clock.now_utc());
    persist_ok(ctx, &mut worker)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
