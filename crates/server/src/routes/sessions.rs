use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
};
use qbank_core::model::SessionId;
use services::StartSession;

use crate::{
    auth::CurrentUser,
    dto::{SessionResponse, StartSessionRequest},
    error::ApiError,
    state::AppState,
};

pub async fn start_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let Json(request) = payload?;
    let session = state
        .services
        .sessions()
        .start(
            &user,
            StartSession {
                bank_id: request.question_bank_id,
                mode: request.mode,
                total_questions: request.total_questions,
                metadata: request.metadata,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

pub async fn get_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Path(id) = id?;
    let session = state.services.sessions().get(&user, SessionId::new(id)).await?;
    Ok(Json(session.into()))
}

pub async fn pause_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Path(id) = id?;
    let session = state.services.sessions().pause(&user, SessionId::new(id)).await?;
    Ok(Json(session.into()))
}

pub async fn resume_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Path(id) = id?;
    let session = state.services.sessions().resume(&user, SessionId::new(id)).await?;
    Ok(Json(session.into()))
}

pub async fn complete_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Path(id) = id?;
    let session = state
        .services
        .sessions()
        .complete(&user, SessionId::new(id))
        .await?;
    Ok(Json(session.into()))
}
