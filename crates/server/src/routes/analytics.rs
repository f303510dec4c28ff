use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};

use crate::{
    auth::CurrentUser,
    dto::{AnalyticsQuery, AnalyticsResponse},
    error::ApiError,
    state::AppState,
};

pub async fn report_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<AnalyticsQuery>, QueryRejection>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let Query(query) = query?;
    let (from, to) = query.bounds()?;
    let summary = state.services.analytics().summary(&user, from, to).await?;
    Ok(Json(summary.into()))
}
