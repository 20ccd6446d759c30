// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker REST handlers.

use super::AppState;
use crate::commands::{CreateWorkerPayload, ImportWorkerPayload};
use crate::mediator::Command;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use labfleet_core::{Clock, OperationResult, WorkerId};
use labfleet_wire::{http_status, LabDto, WorkerDto, WorkerMetricsDto};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Map a command result onto HTTP, overriding the success code where a
/// route promises one (201 create, 202 terminate).
fn respond(result: OperationResult, ok_status: StatusCode) -> Response {
    let code = if result.is_ok() {
        ok_status
    } else {
        StatusCode::from_u16(http_status(result.status)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    };
    (code, Json(result)).into_response()
}

fn parse_worker_id(id: &str) -> Result<WorkerId, Response> {
    id.parse::<WorkerId>().map_err(|_| {
        respond(
            OperationResult::bad_request(format!("'{id}' is not a worker id")),
            StatusCode::OK,
        )
    })
}

#[derive(Deserialize)]
pub struct CreateWorkerRequest {
    pub name: String,
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
}

pub async fn create<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path(region): Path<String>,
    Json(body): Json<CreateWorkerRequest>,
) -> Response {
    let payload = CreateWorkerPayload {
        name: body.name,
        region,
        instance_type: body.instance_type,
        image_id: body.image_id,
        image_name: body.image_name,
        subnet_id: body.subnet_id,
        security_group_ids: body.security_group_ids,
        tags: body.tags,
        created_by: "api".to_string(),
    };
    let result = state
        .mediator
        .dispatch(Command::CreateWorker(payload), state.cancel.child_token())
        .await;
    respond(result, StatusCode::CREATED)
}

#[derive(Deserialize)]
pub struct ImportWorkerRequest {
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn import<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path(region): Path<String>,
    Json(body): Json<ImportWorkerRequest>,
) -> Response {
    let payload = ImportWorkerPayload {
        region,
        instance_id: body.instance_id,
        image_id: body.image_id,
        image_name: body.image_name,
        name: body.name,
        created_by: "api".to_string(),
    };
    let result = state
        .mediator
        .dispatch(Command::ImportWorker(payload), state.cancel.child_token())
        .await;
    respond(result, StatusCode::CREATED)
}

#[derive(Deserialize)]
pub struct BulkImportRequest {
    pub image_name: String,
}

pub async fn bulk_import<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path(region): Path<String>,
    Json(body): Json<BulkImportRequest>,
) -> Response {
    let result = state
        .mediator
        .dispatch(
            Command::BulkImportWorkers {
                region,
                image_name: body.image_name,
                created_by: "api".to_string(),
            },
            state.cancel.child_token(),
        )
        .await;
    respond(result, StatusCode::OK)
}

pub async fn terminate<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    let result = state
        .mediator
        .dispatch(
            Command::TerminateWorker { worker_id },
            state.cancel.child_token(),
        )
        .await;
    respond(result, StatusCode::ACCEPTED)
}

pub async fn start<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    let result = state
        .mediator
        .dispatch(Command::StartWorker { worker_id }, state.cancel.child_token())
        .await;
    respond(result, StatusCode::OK)
}

pub async fn stop<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    let result = state
        .mediator
        .dispatch(Command::StopWorker { worker_id }, state.cancel.child_token())
        .await;
    respond(result, StatusCode::OK)
}

/// Manual refresh shares the scheduler's path and throttle: whichever of
/// the two fires first within the window wins, the other is skipped.
pub async fn refresh<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    let ctx = state.mediator.context();
    let mut dispatched = Vec::new();
    let mut throttled = Vec::new();

    if ctx.throttle.try_acquire(worker_id, "metrics") {
        let result = state
            .mediator
            .dispatch(
                Command::SyncWorkerCloudMetrics { worker_id },
                state.cancel.child_token(),
            )
            .await;
        if !result.is_ok() {
            return respond(result, StatusCode::OK);
        }
        dispatched.push("metrics");
    } else {
        throttled.push("metrics");
    }

    if ctx.throttle.try_acquire(worker_id, "labs") {
        let result = state
            .mediator
            .dispatch(
                Command::SyncWorkerServiceData { worker_id },
                state.cancel.child_token(),
            )
            .await;
        if !result.is_ok() {
            return respond(result, StatusCode::OK);
        }
        let result = state
            .mediator
            .dispatch(
                Command::RefreshWorkerLabs { worker_id },
                state.cancel.child_token(),
            )
            .await;
        if !result.is_ok() {
            return respond(result, StatusCode::OK);
        }
        dispatched.push("labs");
    } else {
        throttled.push("labs");
    }

    respond(
        OperationResult::ok(Some(serde_json::json!({
            "dispatched": dispatched,
            "throttled": throttled,
        }))),
        StatusCode::OK,
    )
}

#[derive(Deserialize)]
pub struct TagsRequest {
    pub tags: BTreeMap<String, String>,
}

pub async fn update_tags<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
    Json(body): Json<TagsRequest>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    let result = state
        .mediator
        .dispatch(
            Command::UpdateWorkerTags {
                worker_id,
                tags: body.tags,
            },
            state.cancel.child_token(),
        )
        .await;
    respond(result, StatusCode::OK)
}

pub async fn enable_idle_detection<C: Clock>(
    state: State<Arc<AppState<C>>>,
    path: Path<(String, String)>,
) -> Response {
    set_idle_detection(state, path, true).await
}

pub async fn disable_idle_detection<C: Clock>(
    state: State<Arc<AppState<C>>>,
    path: Path<(String, String)>,
) -> Response {
    set_idle_detection(state, path, false).await
}

async fn set_idle_detection<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
    enabled: bool,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    let result = state
        .mediator
        .dispatch(
            Command::SetIdleDetection { worker_id, enabled },
            state.cancel.child_token(),
        )
        .await;
    respond(result, StatusCode::OK)
}

pub async fn delete_lab<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id, lab_id)): Path<(String, String, String)>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    let result = state
        .mediator
        .dispatch(
            Command::DeleteLab { worker_id, lab_id },
            state.cancel.child_token(),
        )
        .await;
    respond(result, StatusCode::OK)
}

pub async fn list<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path(region): Path<String>,
) -> Response {
    let workers: Vec<WorkerDto> = state
        .mediator
        .context()
        .store
        .workers_in_region(&region)
        .iter()
        .map(WorkerDto::from)
        .collect();
    Json(workers).into_response()
}

pub async fn status<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    match state.mediator.context().store.get_worker(worker_id) {
        Some(worker) => Json(WorkerDto::from(&worker)).into_response(),
        None => respond(
            OperationResult::not_found(format!("worker {worker_id} not found")),
            StatusCode::OK,
        ),
    }
}

pub async fn labs<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    let labs: Vec<LabDto> = state
        .mediator
        .context()
        .store
        .labs_for_worker(worker_id)
        .iter()
        .map(LabDto::from)
        .collect();
    Json(labs).into_response()
}

pub async fn metrics<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
    Path((_region, id)): Path<(String, String)>,
) -> Response {
    let worker_id = match parse_worker_id(&id) {
        Ok(worker_id) => worker_id,
        Err(response) => return response,
    };
    match state.mediator.context().store.get_worker(worker_id) {
        Some(worker) => Json(WorkerMetricsDto::from(&worker)).into_response(),
        None => respond(
            OperationResult::not_found(format!("worker {worker_id} not found")),
            StatusCode::OK,
        ),
    }
}
