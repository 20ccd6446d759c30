// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command dispatch.
//!
//! One process-wide mediator maps each command onto its handler, statically.
//! Dispatch acquires the target worker's logical lock for the duration of
//! the handler, so two mutations of the same aggregate never interleave;
//! commands against different workers run concurrently.

use crate::commands::{self, CreateWorkerPayload, ImportWorkerPayload};
use crate::context::FleetContext;
use labfleet_core::{Clock, OperationResult, WorkerId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// All commands the control plane accepts.
#[derive(Debug, Clone)]
pub enum Command {
    CreateWorker(CreateWorkerPayload),
    ImportWorker(ImportWorkerPayload),
    BulkImportWorkers {
        region: String,
        image_name: String,
        created_by: String,
    },
    StartWorker {
        worker_id: WorkerId,
    },
    StopWorker {
        worker_id: WorkerId,
    },
    TerminateWorker {
        worker_id: WorkerId,
    },
    UpdateWorkerTags {
        worker_id: WorkerId,
        tags: BTreeMap<String, String>,
    },
    SyncWorkerCloudMetrics {
        worker_id: WorkerId,
    },
    SyncWorkerServiceData {
        worker_id: WorkerId,
    },
    RefreshWorkerLabs {
        worker_id: WorkerId,
    },
    DeleteLab {
        worker_id: WorkerId,
        lab_id: String,
    },
    SetIdleDetection {
        worker_id: WorkerId,
        enabled: bool,
    },
    DetectWorkerIdle {
        worker_id: WorkerId,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateWorker(_) => "create_worker",
            Command::ImportWorker(_) => "import_worker",
            Command::BulkImportWorkers { .. } => "bulk_import_workers",
            Command::StartWorker { .. } => "start_worker",
            Command::StopWorker { .. } => "stop_worker",
            Command::TerminateWorker { .. } => "terminate_worker",
            Command::UpdateWorkerTags { .. } => "update_worker_tags",
            Command::SyncWorkerCloudMetrics { .. } => "sync_worker_cloud_metrics",
            Command::SyncWorkerServiceData { .. } => "sync_worker_service_data",
            Command::RefreshWorkerLabs { .. } => "refresh_worker_labs",
            Command::DeleteLab { .. } => "delete_lab",
            Command::SetIdleDetection { .. } => "set_idle_detection",
            Command::DetectWorkerIdle { .. } => "detect_worker_idle",
        }
    }

    /// Target aggregate, when the command addresses one.
    pub fn worker_id(&self) -> Option<WorkerId> {
        match self {
            Command::CreateWorker(_)
            | Command::ImportWorker(_)
            | Command::BulkImportWorkers { .. } => None,
            Command::StartWorker { worker_id }
            | Command::StopWorker { worker_id }
            | Command::TerminateWorker { worker_id }
            | Command::UpdateWorkerTags { worker_id, .. }
            | Command::SyncWorkerCloudMetrics { worker_id }
            | Command::SyncWorkerServiceData { worker_id }
            | Command::RefreshWorkerLabs { worker_id }
            | Command::DeleteLab { worker_id, .. }
            | Command::SetIdleDetection { worker_id, .. }
            | Command::DetectWorkerIdle { worker_id } => Some(*worker_id),
        }
    }
}

/// Routes commands to handlers under the per-worker lock.
pub struct Mediator<C: Clock> {
    ctx: Arc<FleetContext<C>>,
}

impl<C: Clock> Clone for Mediator<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<C: Clock> Mediator<C> {
    pub fn new(ctx: Arc<FleetContext<C>>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<FleetContext<C>> {
        &self.ctx
    }

    pub async fn dispatch(&self, command: Command, cancel: CancellationToken) -> OperationResult {
        let name = command.name();
        let worker = command.worker_id();
        let span = tracing::info_span!(
            "command",
            command = name,
            worker = worker.map(|id| id.to_string()).unwrap_or_default()
        );
        let ctx = self.ctx.clone();

        async move {
            let _guard = match worker {
                Some(id) => Some(ctx.locks.lock_for(id).lock_owned().await),
                None => None,
            };

            let result = match command {
                Command::CreateWorker(payload) => {
                    commands::create::handle_create(&ctx, payload, &cancel).await
                }
                Command::ImportWorker(payload) => {
                    commands::import::handle_import(&ctx, payload, &cancel).await
                }
                Command::BulkImportWorkers {
                    region,
                    image_name,
                    created_by,
                } => {
                    commands::import::handle_bulk_import(&ctx, &region, &image_name, &created_by, &cancel)
                        .await
                }
                Command::StartWorker { worker_id } => {
                    commands::lifecycle::handle_start(&ctx, worker_id, &cancel).await
                }
                Command::StopWorker { worker_id } => {
                    commands::lifecycle::handle_stop(&ctx, worker_id, &cancel).await
                }
                Command::TerminateWorker { worker_id } => {
                    commands::lifecycle::handle_terminate(&ctx, worker_id, &cancel).await
                }
                Command::UpdateWorkerTags { worker_id, tags } => {
                    commands::lifecycle::handle_update_tags(&ctx, worker_id, tags, &cancel).await
                }
                Command::SyncWorkerCloudMetrics { worker_id } => {
                    commands::sync_metrics::handle_sync_cloud_metrics(&ctx, worker_id, &cancel).await
                }
                Command::SyncWorkerServiceData { worker_id } => {
                    commands::sync_service::handle_sync_service_data(&ctx, worker_id, &cancel).await
                }
                Command::RefreshWorkerLabs { worker_id } => {
                    commands::labs::handle_refresh_labs(&ctx, worker_id, &cancel).await
                }
                Command::DeleteLab { worker_id, lab_id } => {
                    commands::labs::handle_delete_lab(&ctx, worker_id, &lab_id, &cancel).await
                }
                Command::SetIdleDetection { worker_id, enabled } => {
                    commands::idle::handle_set_idle_detection(&ctx, worker_id, enabled).await
                }
                Command::DetectWorkerIdle { worker_id } => {
                    commands::idle::handle_detect_idle(&ctx, worker_id, &cancel).await
                }
            };

            match result.status {
                labfleet_core::OperationStatus::Ok => {
                    tracing::debug!(command = name, "command ok")
                }
                status => tracing::warn!(
                    command = name,
                    status = ?status,
                    error_kind = result.error_kind.as_deref().unwrap_or(""),
                    message = result.message.as_deref().unwrap_or(""),
                    "command failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "mediator_tests.rs"]
mod tests;
