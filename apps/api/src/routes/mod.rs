pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::generation::handlers as generation;
use crate::interviews::handlers as interviews;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let max_recording_bytes = state.config.max_recording_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Question generation, also served at the voice-agent path
        .route(
            "/generate",
            get(generation::handle_generate_info).post(generation::handle_generate),
        )
        .route(
            "/api/vapi/generate",
            get(generation::handle_generate_info).post(generation::handle_generate),
        )
        // Interviews
        .route(
            "/api/interviews/:id/summary",
            get(interviews::handle_summary),
        )
        .route(
            "/api/interviews/:id/recording",
            post(interviews::handle_upload_recording)
                .layer(DefaultBodyLimit::max(max_recording_bytes)),
        )
        .with_state(state)
}
