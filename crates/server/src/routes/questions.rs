use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use services::AnswerSubmission;

use crate::{
    auth::CurrentUser,
    dto::{AnswerResponse, QuestionView, QuestionsQuery, QuestionsResponse, SubmitAnswerRequest},
    error::ApiError,
    state::AppState,
};

pub async fn list_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<QuestionsQuery>, QueryRejection>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    let Query(query) = query?;
    let listing = state
        .services
        .questions()
        .list(
            &user,
            query.question_bank_id,
            query.mode.unwrap_or_default(),
            query.limit,
            query.offset,
        )
        .await?;

    let reveal = listing.reveal_answers;
    Ok(Json(QuestionsResponse {
        success: true,
        questions: listing
            .questions
            .into_iter()
            .map(|q| QuestionView::new(q, reveal))
            .collect(),
        total: listing.total,
        has_more: listing.has_more,
    }))
}

pub async fn submit_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<SubmitAnswerRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(request) = payload?;
    let outcome = state
        .services
        .answers()
        .submit(
            &user,
            AnswerSubmission {
                question_id: request.question_id,
                selected_option: request.selected_option,
                time_spent: request.time_spent,
                is_flagged: request.is_flagged,
                session_id: request.session_id,
            },
        )
        .await?;
    Ok(Json(outcome.into()))
}
