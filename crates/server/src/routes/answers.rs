use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
};
use qbank_core::model::AnswerId;

use crate::{
    auth::CurrentUser,
    dto::{FlagRequest, FlagResponse},
    error::ApiError,
    state::AppState,
};

pub async fn flag_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<FlagRequest>, JsonRejection>,
) -> Result<Json<FlagResponse>, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let answer = state
        .services
        .answers()
        .set_flag(&user, AnswerId::new(id), request.is_flagged)
        .await?;
    Ok(Json(answer.into()))
}
