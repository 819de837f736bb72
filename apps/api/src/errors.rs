use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::{BackendError, StorageError};
use crate::capture::upload::UploadError;
use crate::llm_client::LlmError;

const REDACTED_MESSAGE: &str = "An internal server error occurred";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every response body has the shape `{ "success": false, "error": "..." }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),

    /// An internal error whose message is withheld from the client.
    #[error("{REDACTED_MESSAGE}")]
    Redacted,
}

impl AppError {
    /// Replaces the message of internal errors with a generic one unless
    /// `expose` is set. Client errors (400/404) are always passed through.
    pub fn with_exposure(self, expose: bool) -> Self {
        if expose || !self.is_internal() {
            return self;
        }
        AppError::Redacted
    }

    fn is_internal(&self) -> bool {
        !matches!(self, AppError::Validation(_) | AppError::NotFound(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Storage(e) => AppError::Storage(e),
            UploadError::Feedback(e) => AppError::Backend(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Llm(e) => tracing::error!("LLM error: {e}"),
            AppError::Backend(e) => tracing::error!("Backend error: {e}"),
            AppError::Storage(e) => tracing::error!("Storage error: {e}"),
            AppError::Internal(msg) => tracing::error!("Internal error: {msg}"),
            AppError::Redacted => tracing::error!("Internal error (message withheld from client)"),
            AppError::Validation(_) | AppError::NotFound(_) => {}
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
