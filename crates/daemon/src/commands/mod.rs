// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command handlers.
//!
//! One module per handler family. Handlers never take locks — the mediator
//! holds the per-worker lock around them — and they never publish events
//! for unpersisted state.

pub mod create;
pub mod idle;
pub mod import;
pub mod labs;
pub mod lifecycle;
pub mod sync_metrics;
pub mod sync_service;

use labfleet_core::{OperationResult, Worker, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Payload for `CreateWorker`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateWorkerPayload {
    pub name: String,
    #[serde(default)]
    pub region: String,
    pub instance_type: String,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub created_by: String,
}

/// Payload for `ImportWorker`. Exactly one of `instance_id`, `image_id`,
/// `image_name` selects the instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportWorkerPayload {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_by: String,
}

/// Run a future unless the command is cancelled first.
pub(crate) async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        value = fut => Some(value),
    }
}

/// Uniform result for a cancelled command. Nothing was persisted after the
/// cancellation point.
pub(crate) fn cancelled() -> OperationResult {
    OperationResult::failed_dependency("cancelled", "operation cancelled")
}

/// Load a worker or produce the command's NOT_FOUND result.
pub(crate) fn load_worker<C: labfleet_core::Clock>(
    ctx: &crate::context::FleetContext<C>,
    worker_id: WorkerId,
) -> Result<Worker, OperationResult> {
    ctx.store
        .get_worker(worker_id)
        .ok_or_else(|| OperationResult::not_found(format!("worker {worker_id} not found")))
}

/// DTO payload for OK results.
pub(crate) fn worker_data(worker: &Worker) -> Option<serde_json::Value> {
    serde_json::to_value(labfleet_wire::WorkerDto::from(worker)).ok()
}

/// Final persist of a handler: publish drained events, emit the snapshot if
/// anything significant changed, return OK with the worker projection.
pub(crate) fn persist_ok<C: labfleet_core::Clock>(
    ctx: &crate::context::FleetContext<C>,
    worker: &mut Worker,
) -> OperationResult {
    match ctx.persist_and_publish(worker) {
        Ok(significant) => {
            if significant {
                ctx.publish_snapshot(worker);
            }
            OperationResult::ok(worker_data(worker))
        }
        Err(err) => OperationResult::internal(err.to_string()),
    }
}
