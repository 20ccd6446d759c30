// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle detection and auto-pause.

use super::{load_worker, persist_ok, worker_data};
use crate::commands::lifecycle;
use crate::context::FleetContext;
use labfleet_core::{Clock, OperationResult, WorkerId, WorkerStatus};
use tokio_util::sync::CancellationToken;

pub(crate) async fn handle_set_idle_detection<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    enabled: bool,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    if worker.set_idle_detection(enabled, ctx.clock.now_utc()) {
        return persist_ok(ctx, &mut worker);
    }
    OperationResult::ok(worker_data(&worker))
}

/// Decide whether a worker has gone idle and, if so, auto-pause it.
///
/// Idle means: detection enabled, not already system-paused, RUNNING, no
/// labs locally, and no activity within the configured window. The pause is
/// recorded first, then a stop is dispatched through the shared lifecycle
/// path.
pub(crate) async fn handle_detect_idle<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    cancel: &CancellationToken,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };

    if worker.status != WorkerStatus::Running
        || !worker.idle.detection_enabled
        || worker.idle.paused_by_system
    {
        return OperationResult::ok(Some(serde_json::json!({"idle": false, "skipped": true})));
    }

    let now = ctx.clock.now_utc();
    let labs = ctx.store.lab_ids_for_worker(worker_id).len();
    let last_activity = worker.idle.last_activity_at.unwrap_or(worker.created_at);
    let idle_for = now.signed_duration_since(last_activity);
    let window = chrono::Duration::from_std(ctx.config.idle_window)
        .unwrap_or_else(|_| chrono::Duration::seconds(1800));

    if labs > 0 || idle_for < window {
        return OperationResult::ok(Some(serde_json::json!({"idle": false})));
    }

    if let Err(err) = worker.auto_pause(now) {
        return OperationResult::from(err);
    }
    match ctx.persist_and_publish(&mut worker) {
        Ok(significant) => {
            if significant {
                ctx.publish_snapshot(&worker);
            }
        }
        Err(err) => return OperationResult::internal(err.to_string()),
    }
    tracing::info!(
        worker = %worker_id,
        idle_minutes = idle_for.num_minutes(),
        "idle worker auto-paused, stopping"
    );

    // Stop through the shared lifecycle path; the pause above survives even
    // if the stop fails (the next detection tick will not re-pause, and the
    // operator sees the paused flag with a RUNNING status).
    let stop = lifecycle::handle_stop(ctx, worker_id, cancel).await;
    if !stop.is_ok() {
        tracing::warn!(
            worker = %worker_id,
            message = stop.message.as_deref().unwrap_or(""),
            "auto-pause stop failed"
        );
        return stop;
    }
    OperationResult::ok(Some(serde_json::json!({"idle": true, "paused": true})))
}

#[cfg(test)]
#[path = "idle_tests.rs"]
mod tests;
