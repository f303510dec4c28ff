use axum::{
    Json,
    extract::{Multipart, Query, State, rejection::QueryRejection},
};
use qbank_core::model::UploadError;
use services::UploadServiceError;

use crate::{
    auth::CurrentUser,
    dto::{UploadResponse, UploadStatusQuery, UploadStatusResponse},
    error::ApiError,
    state::AppState,
};

const FILE_FIELD: &str = "file";

pub async fn upload_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let mime_type = field.content_type().unwrap_or_default().to_owned();
        let bytes = field.bytes().await?;

        let record = state
            .services
            .uploads()
            .accept(&user, &file_name, &mime_type, &bytes)
            .await?;
        return Ok(Json(record.into()));
    }

    Err(UploadServiceError::from(UploadError::MissingFile).into())
}

pub async fn status_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<UploadStatusQuery>, QueryRejection>,
) -> Result<Json<UploadStatusResponse>, ApiError> {
    let Query(query) = query?;
    let upload_id = query
        .upload_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Upload ID required".into()))?;

    let record = state.services.uploads().status(&user, &upload_id).await?;
    Ok(Json(record.into()))
}
