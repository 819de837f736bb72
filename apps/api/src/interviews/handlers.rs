//! Axum route handlers for stored interviews.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::interviews::summary::{summarize, InterviewSummary};
use crate::models::feedback::{FeedbackView, FEEDBACK_COLLECTION};
use crate::models::interview::{InterviewRecord, INTERVIEWS_COLLECTION};
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub user_id: Option<String>,
}

/// GET /api/interviews/:id/summary?user_id=
pub async fn handle_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Value>, AppError> {
    let expose = state.config.expose_internal_errors;
    let documents = state.backend.documents.as_ref();

    let raw = documents
        .get(INTERVIEWS_COLLECTION, &id)
        .await
        .map_err(|e| AppError::from(e).with_exposure(expose))?
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))?;
    let interview: InterviewRecord = serde_json::from_value(raw)
        .map_err(|e| AppError::Internal(format!("Malformed interview {id}: {e}")).with_exposure(expose))?;

    let user_id = query.user_id.filter(|u| !u.is_empty());
    let feedback = match user_id {
        Some(user_id) => documents
            .get(FEEDBACK_COLLECTION, &id)
            .await
            .map_err(|e| AppError::from(e).with_exposure(expose))?
            .and_then(|raw| serde_json::from_value::<FeedbackView>(raw).ok())
            .filter(|f| f.user_id.as_deref() == Some(user_id.as_str())),
        None => None,
    };

    let summary: InterviewSummary = summarize(&id, &interview, feedback.as_ref(), Utc::now());
    Ok(Json(json!({ "success": true, "data": summary })))
}

/// POST /api/interviews/:id/recording
///
/// Body is the finished recording. The owner comes from `x-user-id`;
/// without it the recording is filed under the anonymous user.
pub async fn handle_upload_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if body.is_empty() {
        return Err(AppError::Validation("Recording is empty".to_string()));
    }

    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    info!("Receiving recording for interview {id} ({} bytes)", body.len());
    let log_id = id.clone();
    let on_progress = move |progress: f64| {
        debug!("Upload {log_id}: {progress:.0}%");
    };

    let url = state
        .uploads
        .upload_recording(user_id.as_deref(), &id, body, &on_progress)
        .await
        .map_err(|e| AppError::from(e).with_exposure(state.config.expose_internal_errors))?;

    Ok(Json(json!({ "success": true, "videoUrl": url })))
}
