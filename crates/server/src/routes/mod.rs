use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

use crate::state::AppState;

pub mod analytics;
pub mod answers;
pub mod health;
pub mod questions;
pub mod sessions;
pub mod upload;

/// Multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn api_router(max_upload_bytes: u64) -> Router<AppState> {
    let upload_limit =
        usize::try_from(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/api/questions",
            get(questions::list_handler).post(questions::submit_handler),
        )
        .route("/api/answers/{id}", patch(answers::flag_handler))
        .route("/api/sessions", post(sessions::start_handler))
        .route("/api/sessions/{id}", get(sessions::get_handler))
        .route("/api/sessions/{id}/pause", post(sessions::pause_handler))
        .route("/api/sessions/{id}/resume", post(sessions::resume_handler))
        .route("/api/sessions/{id}/complete", post(sessions::complete_handler))
        .route("/api/analytics", get(analytics::report_handler))
        .route(
            "/api/upload",
            post(upload::upload_handler)
                .get(upload::status_handler)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/health", get(health::health_handler))
}
