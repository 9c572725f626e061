//! REST handlers for the research API
//!
//! All responses use the `{success, data|error}` envelope. Mutating
//! operations return before the worker call resolves; clients poll the
//! status endpoint or subscribe to events.

use super::error::ApiError;
use super::state::AppState;
use crate::models::{Phase, PhaseRecord, PhaseStatus, Session, SessionMetadata};
use crate::orchestrator::RetryMode;
use crate::report;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

fn ok(data: Value) -> Json<Value> {
    Json(json!({"success": true, "data": data}))
}

// ============================================================================
// Initiate
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub problem_statement: String,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub additional_info: Option<Value>,
}

pub async fn initiate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<InitiateRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let metadata = SessionMetadata {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        additional_info: body.additional_info,
    };

    let session =
        state
            .orchestrator
            .initiate(&body.problem_statement, body.user_email, metadata)?;

    Ok((
        StatusCode::CREATED,
        ok(json!({
            "chatId": session.chat_id,
            "status": session.overall_status,
            "currentPhase": session.current_phase,
            "progress": session.progress,
            "createdAt": session.created_at,
        })),
    ))
}

// ============================================================================
// Status and session reads
// ============================================================================

fn phase_view(record: &PhaseRecord) -> Value {
    json!({
        "status": record.status,
        "startedAt": record.started_at,
        "completedAt": record.completed_at,
        "error": record.error,
    })
}

fn status_summary(session: &Session) -> Value {
    let phases: serde_json::Map<String, Value> = Phase::ALL
        .iter()
        .map(|p| {
            (
                format!("phase{}", p.number()),
                phase_view(session.phases.record(*p)),
            )
        })
        .collect();

    json!({
        "chatId": session.chat_id,
        "overallStatus": session.overall_status,
        "currentPhase": session.current_phase,
        "progress": session.progress,
        "phases": phases,
        "createdAt": session.created_at,
        "updatedAt": session.updated_at,
    })
}

/// Per-phase statuses plus the overall summary. Reading status also
/// reconciles phases stuck in `processing` past the staleness threshold.
pub async fn status(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state.orchestrator.reconcile_stale(&chat_id)?;
    Ok(ok(status_summary(&session)))
}

/// The full session document
pub async fn session(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state.orchestrator.store().get(&chat_id)?;
    Ok(ok(serde_json::to_value(&session).map_err(|e| {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    })?))
}

// ============================================================================
// Listing
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub user_email: Option<String>,
}

fn pagination_envelope(sessions: Vec<Value>, page: usize, limit: usize, total: usize) -> Value {
    let total_pages = total.div_ceil(limit).max(1);
    json!({
        "sessions": sessions,
        "currentPage": page,
        "totalPages": total_pages,
        "totalSessions": total,
        "hasNext": page < total_pages,
        "hasPrev": page > 1,
    })
}

pub async fn sessions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let result = state
        .orchestrator
        .store()
        .list(params.user_email.as_deref(), page, limit)?;

    let sessions: Vec<Value> = result.sessions.iter().map(status_summary).collect();
    Ok(ok(pagination_envelope(sessions, page, limit, result.total)))
}

// ============================================================================
// Retry, stop, delete
// ============================================================================

fn parse_phase(n: u8) -> Result<Phase, ApiError> {
    Phase::from_number(n)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid phase number: {}. Expected 1-6.", n)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    pub phase: u8,
    #[serde(default)]
    pub delete_existing: bool,
}

pub async fn retry_phase(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(body): Json<RetryRequest>,
) -> Result<Json<Value>, ApiError> {
    let phase = parse_phase(body.phase)?;
    let mode = if body.delete_existing {
        RetryMode::Destructive
    } else {
        RetryMode::Additive
    };

    let session = state.orchestrator.retry_phase(&chat_id, phase, mode)?;
    Ok(ok(status_summary(&session)))
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub phase: u8,
}

pub async fn stop_phase(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(body): Json<StopRequest>,
) -> Result<Json<Value>, ApiError> {
    let phase = parse_phase(body.phase)?;
    let session = state.orchestrator.stop_phase(&chat_id, phase)?;
    Ok(ok(status_summary(&session)))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.store().delete(&chat_id)?;
    Ok(ok(json!({"message": "Research session deleted"})))
}

// ============================================================================
// Report
// ============================================================================

/// Markdown report over the completed session, available once phase 6 has
/// completed
pub async fn report(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state.orchestrator.store().get(&chat_id)?;
    if session.phases.record(Phase::Synthesis).status != PhaseStatus::Completed {
        return Err(ApiError::bad_request(
            "Final report is not ready. Phase 6 has not completed.",
        ));
    }

    let markdown = report::build_markdown(&session);
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        markdown,
    )
        .into_response())
}
