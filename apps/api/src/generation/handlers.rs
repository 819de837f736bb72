//! Axum route handlers for the question generation endpoint.

use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::generation::generator::create_interview;
use crate::generation::request::GenerateRequest;
use crate::state::AppState;

/// POST /generate
///
/// Validates the request, generates questions and stores one interview
/// record. Responds `{success: true}`; the record id is not returned.
/// The body is parsed as JSON whatever its content type; an unreadable body
/// is an internal failure, not a validation one.
pub async fn handle_generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let expose = state.config.expose_internal_errors;
    let body: GenerateRequest = serde_json::from_slice(&body).map_err(|e| {
        AppError::Internal(format!("Invalid request body: {e}")).with_exposure(expose)
    })?;
    let request = body.validate()?;

    create_interview(
        state.backend.documents.as_ref(),
        state.generator.as_ref(),
        request,
    )
    .await
    .map_err(|e| e.with_exposure(expose))?;

    Ok(Json(json!({ "success": true })))
}

/// GET /generate
pub async fn handle_generate_info() -> Json<Value> {
    Json(json!({ "success": true, "data": "Thank you!" }))
}
