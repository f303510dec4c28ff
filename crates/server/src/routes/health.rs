use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use services::HealthStatus;

use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.services.health().check().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}
