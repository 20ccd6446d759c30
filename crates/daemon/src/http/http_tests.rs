// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{harness, TestHarness};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use labfleet_core::{FakeClock, WorkerStatus};
use tower::ServiceExt;

fn app(h: &TestHarness, token: Option<&str>) -> Router {
    let state: Arc<AppState<FakeClock>> = AppState::new(
        h.mediator.clone(),
        token.map(str::to_string),
        CancellationToken::new(),
    );
    router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn healthz_is_open_even_with_a_token_configured() {
    let h = harness();
    let response = app(&h, Some("secret")).oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_requires_the_bearer_token() {
    let h = harness();
    let app = app(&h, Some("secret"));

    let denied = app
        .clone()
        .oneshot(get("/workers/region/r1/workers"))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/workers/region/r1/workers")
                .header("authorization", "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let allowed = app
        .oneshot(
            Request::builder()
                .uri("/workers/region/r1/workers")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_returns_201_with_the_projection() {
    let h = harness();
    h.cloud.push_run_result(Ok("i-1"));

    let response = app(&h, None)
        .oneshot(post_json(
            "/workers/region/r1/workers",
            serde_json::json!({
                "name": "w1",
                "instance_type": "t3.large",
                "image_id": "img-1",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["data"]["cloud_instance_id"], "i-1");
}

#[tokio::test]
async fn create_validation_maps_to_400() {
    let h = harness();
    let response = app(&h, None)
        .oneshot(post_json(
            "/workers/region/r1/workers",
            serde_json::json!({"name": "", "instance_type": "t3.large", "image_id": "img-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn terminate_returns_202() {
    let h = harness();
    let worker = h.insert_worker("w1", "i-1", WorkerStatus::Running);

    let response = app(&h, None)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/workers/region/r1/workers/{}", worker.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn malformed_worker_id_is_400() {
    let h = harness();
    let response = app(&h, None)
        .oneshot(get("/workers/region/r1/workers/not-a-uuid/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_worker_status_is_404() {
    let h = harness();
    let response = app(&h, None)
        .oneshot(get(&format!(
            "/workers/region/r1/workers/{}/status",
            labfleet_core::WorkerId::new()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_returns_workers_in_the_region() {
    let h = harness();
    h.insert_worker("w1", "i-1", WorkerStatus::Running);

    let response = app(&h, None)
        .oneshot(get("/workers/region/r1/workers"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["name"], "w1");

    let other = app(&h, None)
        .oneshot(get("/workers/region/elsewhere/workers"))
        .await
        .unwrap();
    let body = body_json(other).await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn idle_detection_routes_toggle_the_flag() {
    let h = harness();
    let worker = h.insert_worker("w1", "i-1", WorkerStatus::Running);

    let response = app(&h, None)
        .oneshot(post_json(
            &format!(
                "/workers/region/r1/workers/{}/idle-detection/enable",
                worker.id
            ),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.ctx.store.get_worker(worker.id).unwrap().idle.detection_enabled);
}

#[tokio::test]
async fn manual_refresh_reports_throttled_kinds() {
    let h = harness();
    let worker = h.insert_worker("w1", "i-1", WorkerStatus::Running);
    let app = app(&h, None);

    let first = app
        .clone()
        .oneshot(post_json(
            &format!("/workers/region/r1/workers/{}/refresh", worker.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body = body_json(first).await;
    assert_eq!(body["data"]["dispatched"], serde_json::json!(["metrics", "labs"]));

    // Within the throttle window the same refresh is skipped
    let second = app
        .oneshot(post_json(
            &format!("/workers/region/r1/workers/{}/refresh", worker.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    let body = body_json(second).await;
    assert_eq!(body["data"]["throttled"], serde_json::json!(["metrics", "labs"]));
}
