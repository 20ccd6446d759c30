// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud metrics sync.
//!
//! Two independent sub-updates per run: the health slot (describe-status)
//! and the utilization slot (metrics read). One sub-call failing never
//! invalidates the other's result; the command only fails when both did.

use super::{cancelled, load_worker, with_cancel, worker_data};
use crate::context::FleetContext;
use crate::fanout::publish_sync_failed;
use labfleet_adapters::CloudErrorKind;
use labfleet_core::{Clock, OperationResult, WorkerId, WorkerStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Window for the utilization read.
const UTILIZATION_WINDOW: Duration = Duration::from_secs(600);

pub(crate) async fn handle_sync_cloud_metrics<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    cancel: &CancellationToken,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    let Some(instance_id) = worker.cloud.instance_id.clone() else {
        // Nothing to observe yet (saga still PENDING or FAILED pre-launch)
        return OperationResult::ok(worker_data(&worker));
    };

    let mut successes = 0usize;
    let mut first_error: Option<String> = None;

    let status = match with_cancel(cancel, ctx.cloud.describe_status(&worker.region, &instance_id))
        .await
    {
        Some(result) => result,
        None => return cancelled(),
    };
    let now = ctx.clock.now_utc();
    match status {
        Ok(detail) => {
            successes += 1;
            worker.update_cloud_health(detail.instance_state.clone(), detail.system_status, now);
            if let Some(state) = &detail.instance_state {
                observe_cloud_state(&mut worker, state, ctx);
            }
        }
        Err(err) if err.kind == CloudErrorKind::NotFound => {
            // Observe-absent: a terminating worker's instance is gone
            if worker.status == WorkerStatus::Terminating {
                successes += 1;
                if let Err(err) = worker.transition_to(WorkerStatus::Terminated, now) {
                    tracing::warn!(worker = %worker_id, error = %err, "terminated observation rejected");
                } else {
                    ctx.locks.forget(worker_id);
                }
            } else {
                first_error.get_or_insert(err.to_string());
            }
        }
        Err(err) => {
            first_error.get_or_insert(err.to_string());
        }
    }

    // The utilization read is pointless once the instance is gone
    if worker.status != WorkerStatus::Terminated {
        let util = match with_cancel(
            cancel,
            ctx.cloud
                .get_utilization(&worker.region, &instance_id, UTILIZATION_WINDOW),
        )
        .await
        {
            Some(result) => result,
            None => {
                // Keep whatever the first sub-update already produced
                if worker.has_pending_events() {
                    let _ = ctx.persist_and_publish(&mut worker);
                }
                return cancelled();
            }
        };
        match util {
            Ok(util) => {
                successes += 1;
                let detailed = worker.utilization.detailed_monitoring;
                worker.update_cloud_utilization(
                    util.cpu_pct,
                    util.mem_pct,
                    detailed,
                    ctx.clock.now_utc(),
                );
            }
            Err(err) => {
                first_error.get_or_insert(err.to_string());
            }
        }
    }

    if worker.has_pending_events() {
        match ctx.persist_and_publish(&mut worker) {
            Ok(significant) => {
                if significant {
                    ctx.publish_snapshot(&worker);
                }
            }
            Err(err) => return OperationResult::internal(err.to_string()),
        }
    }

    if successes == 0 {
        let message = first_error.unwrap_or_else(|| "cloud unreachable".to_string());
        publish_sync_failed(&ctx.bus, worker_id, ctx.clock.now_utc(), "cloud", &message);
        return OperationResult::failed_dependency("cloud", message);
    }
    OperationResult::ok(worker_data(&worker))
}

/// Fold the observed cloud state into the lifecycle graph where an edge
/// exists; off-graph observations are logged and skipped.
fn observe_cloud_state<C: Clock>(
    worker: &mut labfleet_core::Worker,
    state: &str,
    ctx: &FleetContext<C>,
) {
    let Some(observed) = WorkerStatus::from_cloud_state(state) else {
        tracing::debug!(worker = %worker.id, state, "unrecognized cloud state");
        return;
    };
    if observed == worker.status {
        return;
    }
    if !worker.status.can_transition_to(observed) {
        tracing::debug!(
            worker = %worker.id,
            from = %worker.status,
            to = %observed,
            "cloud observation outside the lifecycle graph, skipped"
        );
        return;
    }
    if worker.transition_to(observed, ctx.clock.now_utc()).is_ok()
        && observed == WorkerStatus::Terminated
    {
        ctx.locks.forget(worker.id);
    }
}

#[cfg(test)]
#[path = "sync_metrics_tests.rs"]
mod tests;
