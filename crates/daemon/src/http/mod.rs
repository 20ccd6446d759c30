// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: REST routes plus the live event stream.
//!
//! Handlers translate request payloads into commands and map the uniform
//! `OperationResult` onto HTTP statuses. Auth is a static bearer token
//! check — the real validator is an external port; this layer is its seam.

mod auth;
mod stream;
mod workers;

use crate::mediator::Mediator;
use axum::routing::{delete, get, post};
use axum::Router;
use labfleet_core::Clock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state for all HTTP handlers.
pub struct AppState<C: Clock> {
    pub mediator: Mediator<C>,
    pub auth_token: Option<String>,
    /// Root token; per-request commands get child tokens off it.
    pub cancel: CancellationToken,
}

impl<C: Clock> AppState<C> {
    pub fn new(
        mediator: Mediator<C>,
        auth_token: Option<String>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            mediator,
            auth_token,
            cancel,
        })
    }
}

/// Build the full router. `/healthz` stays outside the auth layer.
pub fn router<C: Clock>(state: Arc<AppState<C>>) -> Router {
    let api = Router::new()
        .route(
            "/workers/region/{region}/workers",
            get(workers::list).post(workers::create),
        )
        .route("/workers/region/{region}/workers/import", post(workers::import))
        .route(
            "/workers/region/{region}/workers/bulk-import",
            post(workers::bulk_import),
        )
        .route(
            "/workers/region/{region}/workers/{id}",
            delete(workers::terminate),
        )
        .route(
            "/workers/region/{region}/workers/{id}/start",
            post(workers::start),
        )
        .route(
            "/workers/region/{region}/workers/{id}/stop",
            post(workers::stop),
        )
        .route(
            "/workers/region/{region}/workers/{id}/refresh",
            post(workers::refresh),
        )
        .route(
            "/workers/region/{region}/workers/{id}/tags",
            post(workers::update_tags),
        )
        .route(
            "/workers/region/{region}/workers/{id}/idle-detection/enable",
            post(workers::enable_idle_detection),
        )
        .route(
            "/workers/region/{region}/workers/{id}/idle-detection/disable",
            post(workers::disable_idle_detection),
        )
        .route(
            "/workers/region/{region}/workers/{id}/labs/{lab_id}",
            delete(workers::delete_lab),
        )
        .route(
            "/workers/region/{region}/workers/{id}/status",
            get(workers::status),
        )
        .route(
            "/workers/region/{region}/workers/{id}/labs",
            get(workers::labs),
        )
        .route(
            "/workers/region/{region}/workers/{id}/metrics",
            get(workers::metrics),
        )
        .route("/events/stream", get(stream::events))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer::<C>,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(api)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
