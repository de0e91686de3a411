//! Error types.
//!
//! [`ChainError`] is whatever a chain step can fail with; [`AppError`] is what
//! HTTP handlers return. `AppError` implements [`IntoResponse`] so failures
//! reach the browser as `{"error": "..."}` with a matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::database::DatabaseError;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("language model error: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("not connected to a database; fill in the settings and press connect")]
    NotConnected,

    #[error("could not connect: {0}")]
    Connect(DatabaseError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotConnected => StatusCode::CONFLICT,
            AppError::Connect(DatabaseError::InvalidPort(_)) => StatusCode::BAD_REQUEST,
            AppError::Connect(_) => StatusCode::BAD_GATEWAY,
            AppError::Chain(e) => {
                error!(error = %e, "chain failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
