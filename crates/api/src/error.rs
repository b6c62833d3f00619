//! API error types and saga outcome mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ingestion::{AbortReason, PreconditionError, SagaOutcome};
use serde_json::{Value, json};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Caller identity missing or malformed.
    #[error("Unauthorized request")]
    Unauthorized,
    /// Input rejected before the saga started.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized request".to_string()),
            ApiError::Precondition(err) => (StatusCode::BAD_REQUEST, precondition_message(&err)),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Local paths never leave the server.
fn precondition_message(err: &PreconditionError) -> String {
    match err {
        PreconditionError::Unreadable(_) | PreconditionError::EmptyMaterial(_) => {
            "Uploaded files must not be empty.".to_string()
        }
        _ => err.to_string(),
    }
}

/// Caller-facing rendering of a finished ingestion.
#[derive(Debug)]
pub struct IngestResponse(pub SagaOutcome);

impl IngestResponse {
    /// Status code and JSON body for the outcome.
    pub fn parts(&self) -> (StatusCode, Value) {
        let outcome = &self.0;
        let (status, mut body) = match outcome {
            SagaOutcome::Committed(record) => (
                StatusCode::CREATED,
                json!({
                    "message": "Video uploaded successfully.",
                    "data": record,
                }),
            ),
            SagaOutcome::Aborted {
                reason,
                compensation,
            } => {
                let (status, message) = match reason {
                    AbortReason::PrimaryStoreFailed(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to upload video. Please try again.",
                    ),
                    AbortReason::SecondaryStoreFailed(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to upload thumbnail. Please try again.",
                    ),
                    AbortReason::Cancelled { .. } => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Upload was cancelled before completion.",
                    ),
                };
                (
                    status,
                    json!({
                        "error": message,
                        "reason": reason.as_str(),
                        "compensation": compensation,
                    }),
                )
            }
            SagaOutcome::CommitFailedAfterStore {
                reason,
                compensation,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Failed to save video details to the database. Please try again.",
                    "reason": reason.kind(),
                    "compensation": compensation,
                }),
            ),
        };

        if outcome.requires_reconciliation() {
            body["requires_reconciliation"] = json!(true);
            body["orphans"] = json!(outcome.orphans());
        }

        (status, body)
    }
}

impl IntoResponse for IngestResponse {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();
        (status, Json(body)).into_response()
    }
}
