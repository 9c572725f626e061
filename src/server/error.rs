//! API error mapping
//!
//! Every failure leaves the server as `{success: false, error}` with the
//! HTTP status implied by the failure class.

use crate::models::state_machine::StateTransitionError;
use crate::orchestrator::OrchestratorError;
use crate::store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Validation { .. } => StatusCode::BAD_REQUEST,
            StoreError::Conflict { .. } => StatusCode::CONFLICT,
            StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Store(store) => store.into(),
            OrchestratorError::State(state) => match state {
                StateTransitionError::InvalidTransition { .. }
                | StateTransitionError::PreviousPhaseIncomplete { .. } => {
                    ApiError::bad_request(state.to_string())
                }
            },
            OrchestratorError::AlreadyProcessing { .. }
            | OrchestratorError::NotProcessing { .. } => ApiError::bad_request(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("API error: {}", self.message);
        }
        (
            self.status,
            Json(json!({"success": false, "error": self.message})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_statuses() {
        assert_eq!(ApiError::from(StoreError::NotFound).status, StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::Validation { min: 30, actual: 5 }).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::Conflict {
                chat_id: "x".to_string(),
                expected: 1,
                found: 2
            })
            .status,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_orchestrator_error_statuses() {
        assert_eq!(
            ApiError::from(OrchestratorError::AlreadyProcessing { phase: 2 }).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(OrchestratorError::Store(StoreError::NotFound)).status,
            StatusCode::NOT_FOUND
        );
    }
}
