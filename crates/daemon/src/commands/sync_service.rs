// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service data sync.
//!
//! Four probes run independently: system_information, system_health,
//! system_stats, licensing. Whatever succeeds contributes to the snapshot;
//! a single success is enough to mark the worker AVAILABLE, and only zero
//! successes yield UNAVAILABLE. Fields whose probe failed keep their
//! previous value, so a flaky endpoint degrades the slot instead of
//! erasing it.

use super::{cancelled, load_worker, with_cancel, worker_data};
use crate::context::FleetContext;
use crate::fanout::publish_sync_failed;
use labfleet_adapters::service::extract_labs_count;
use labfleet_adapters::{IntegrationError, IntegrationErrorKind};
use labfleet_core::{Clock, OperationResult, ServiceStatus, WorkerId};
use tokio_util::sync::CancellationToken;

pub(crate) async fn handle_sync_service_data<C: Clock>(
    ctx: &FleetContext<C>,
    worker_id: WorkerId,
    cancel: &CancellationToken,
) -> OperationResult {
    let mut worker = match load_worker(ctx, worker_id) {
        Ok(worker) => worker,
        Err(result) => return result,
    };
    let Some(endpoint) = ctx.service_endpoint(&worker) else {
        // No address yet; nothing to probe
        return OperationResult::ok(worker_data(&worker));
    };
    let client = ctx.services.for_endpoint(&endpoint);

    let mut snapshot = worker.service.clone();
    let mut successes = 0usize;
    let mut failures: Vec<IntegrationError> = Vec::new();

    let info = match with_cancel(cancel, client.get_system_information()).await {
        Some(result) => result,
        None => return cancelled(),
    };
    match info {
        Ok(info) => {
            successes += 1;
            snapshot.version = info.version.or(snapshot.version);
            snapshot.ready = info.ready;
            snapshot.system_info = Some(info.raw);
        }
        Err(err) => failures.push(err),
    }

    let health = match with_cancel(cancel, client.get_system_health()).await {
        Some(result) => result,
        None => return cancelled(),
    };
    match health {
        Ok(Some(health)) => {
            successes += 1;
            snapshot.health_info = Some(health);
        }
        Ok(None) => {} // endpoint absent on this Service version
        Err(err) => failures.push(err),
    }

    let stats = match with_cancel(cancel, client.get_system_stats()).await {
        Some(result) => result,
        None => return cancelled(),
    };
    match stats {
        Ok(Some(stats)) => {
            successes += 1;
            if let Some(count) = extract_labs_count(&stats) {
                snapshot.labs_count = Some(count);
            }
        }
        Ok(None) => {}
        Err(err) => failures.push(err),
    }

    let licensing = match with_cancel(cancel, client.get_licensing()).await {
        Some(result) => result,
        None => return cancelled(),
    };
    match licensing {
        Ok(Some(license)) => {
            successes += 1;
            snapshot.license_info = Some(license);
        }
        Ok(None) => {}
        Err(err) => failures.push(err),
    }

    let now = ctx.clock.now_utc();
    snapshot.status = resolve_status(successes, &failures);
    snapshot.last_synced_at = Some(now);
    worker.update_service(snapshot);

    match ctx.persist_and_publish(&mut worker) {
        Ok(significant) => {
            if significant {
                ctx.publish_snapshot(&worker);
            }
        }
        Err(err) => return OperationResult::internal(err.to_string()),
    }

    if successes == 0 {
        let message = failures
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "service unreachable".to_string());
        publish_sync_failed(&ctx.bus, worker_id, now, "service", &message);
        return OperationResult::failed_dependency("service", message);
    }
    if !failures.is_empty() {
        tracing::debug!(
            worker = %worker_id,
            succeeded = successes,
            failed = failures.len(),
            "partial service sync"
        );
    }
    OperationResult::ok(worker_data(&worker))
}

/// Decision table: any probe success means the Service is reachable.
/// With zero successes, an auth or protocol failure means it answered but
/// is broken (ERROR); pure connect/timeout failures mean UNAVAILABLE.
fn resolve_status(successes: usize, failures: &[IntegrationError]) -> ServiceStatus {
    if successes > 0 {
        return ServiceStatus::Available;
    }
    let answered = failures.iter().any(|err| {
        matches!(
            err.kind,
            IntegrationErrorKind::Auth | IntegrationErrorKind::Protocol
        )
    });
    if answered {
        ServiceStatus::Error
    } else {
        ServiceStatus::Unavailable
    }
}

#[cfg(test)]
#[path = "sync_service_tests.rs"]
mod tests;
