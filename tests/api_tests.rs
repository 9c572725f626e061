//! HTTP API tests driven through the router without binding a socket

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use researchpilot_lib::gateway::{GatewayError, PhaseInputs, WorkerGateway};
use researchpilot_lib::models::Phase;
use researchpilot_lib::orchestrator::Orchestrator;
use researchpilot_lib::server::{api_router, AppState};
use researchpilot_lib::store::sessions::SessionStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const VALID_INPUT: &str = "Design an automated research assistant that can refine a \
    problem statement, search the academic literature for relevant papers, analyze \
    their methodologies in depth, survey existing commercial tools, and synthesize a \
    concrete proposed solution with scored feasibility factors.";

/// Gateway that never responds; API tests only exercise the synchronous path
struct SilentGateway;

impl WorkerGateway for SilentGateway {
    fn call_phase<'a>(
        &'a self,
        _chat_id: &'a str,
        phase: Phase,
        _inputs: PhaseInputs,
    ) -> BoxFuture<'a, Result<Value, GatewayError>> {
        async move {
            Err(GatewayError::NoResponse {
                phase: phase.number(),
            })
        }
        .boxed()
    }
}

fn router() -> (axum::Router, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path()).unwrap();
    let orchestrator = Orchestrator::new(store, Arc::new(SilentGateway));
    (api_router(AppState::new(orchestrator)), dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn initiate_returns_201_with_chat_id() {
    let (app, _dir) = router();
    let response = app
        .oneshot(post_json(
            "/api/research/initiate",
            json!({"problemStatement": VALID_INPUT, "userEmail": "user@example.com"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["chatId"].as_str().is_some());
    assert_eq!(body["data"]["status"], "processing");
    assert_eq!(body["data"]["progress"], 10);
}

#[tokio::test]
async fn initiate_rejects_short_problem_statement() {
    let (app, _dir) = router();
    let response = app
        .oneshot(post_json(
            "/api/research/initiate",
            json!({"problemStatement": "too short"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("at least 30 words"));
}

#[tokio::test]
async fn status_of_unknown_session_is_404() {
    let (app, _dir) = router();
    let response = app
        .oneshot(get("/api/research/status/no-such-session"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn status_reports_per_phase_records() {
    let (app, _dir) = router();
    let created = app
        .clone()
        .oneshot(post_json(
            "/api/research/initiate",
            json!({"problemStatement": VALID_INPUT}),
        ))
        .await
        .unwrap();
    let chat_id = body_json(created).await["data"]["chatId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/api/research/status/{}", chat_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let phases = &body["data"]["phases"];
    assert!(phases["phase1"]["status"].is_string());
    assert_eq!(phases["phase6"]["status"], "pending");
}

#[tokio::test]
async fn retry_rejects_invalid_phase_number() {
    let (app, _dir) = router();
    let created = app
        .clone()
        .oneshot(post_json(
            "/api/research/initiate",
            json!({"problemStatement": VALID_INPUT}),
        ))
        .await
        .unwrap();
    let chat_id = body_json(created).await["data"]["chatId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(post_json(
            &format!("/api/research/{}/retry-phase", chat_id),
            json!({"phase": 9}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Invalid phase number"));
}

#[tokio::test]
async fn stop_phase_requires_processing() {
    let (app, _dir) = router();
    let created = app
        .clone()
        .oneshot(post_json(
            "/api/research/initiate",
            json!({"problemStatement": VALID_INPUT}),
        ))
        .await
        .unwrap();
    let chat_id = body_json(created).await["data"]["chatId"]
        .as_str()
        .unwrap()
        .to_string();

    // Phase 3 has not started
    let response = app
        .oneshot(post_json(
            &format!("/api/research/{}/stop-phase", chat_id),
            json!({"phase": 3}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_removes_the_session() {
    let (app, _dir) = router();
    let created = app
        .clone()
        .oneshot(post_json(
            "/api/research/initiate",
            json!({"problemStatement": VALID_INPUT}),
        ))
        .await
        .unwrap();
    let chat_id = body_json(created).await["data"]["chatId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/research/{}", chat_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/research/session/{}", chat_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn report_unavailable_before_phase6() {
    let (app, _dir) = router();
    let created = app
        .clone()
        .oneshot(post_json(
            "/api/research/initiate",
            json!({"problemStatement": VALID_INPUT}),
        ))
        .await
        .unwrap();
    let chat_id = body_json(created).await["data"]["chatId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/api/research/{}/report", chat_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sessions_listing_paginates() {
    let (app, _dir) = router();
    for _ in 0..3 {
        app.clone()
            .oneshot(post_json(
                "/api/research/initiate",
                json!({"problemStatement": VALID_INPUT}),
            ))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(get("/api/research/sessions?page=1&limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["totalSessions"], 3);
    assert_eq!(body["data"]["totalPages"], 2);
    assert_eq!(body["data"]["hasNext"], true);
    assert_eq!(body["data"]["sessions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn health_endpoint() {
    let (app, _dir) = router();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
