use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use services::{
    AnalyticsServiceError, AnswerServiceError, ErrorKind, QuestionServiceError,
    SessionServiceError, UploadServiceError,
};
use thiserror::Error;

/// Every failure a handler can return.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Service unavailable")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::Forbidden => Self::Forbidden(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::Unavailable => Self::Unavailable(message),
            ErrorKind::Internal => Self::Internal(message),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(detail) => tracing::error!(%detail, "request failed"),
            ApiError::Unavailable(detail) => tracing::error!(%detail, "backing store unavailable"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

macro_rules! from_service_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ApiError {
                fn from(err: $ty) -> Self {
                    Self::from_kind(err.kind(), err.to_string())
                }
            }
        )*
    };
}

from_service_error!(
    AnswerServiceError,
    SessionServiceError,
    QuestionServiceError,
    AnalyticsServiceError,
    UploadServiceError,
);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Validation(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use storage::repository::StorageError;

    #[tokio::test]
    async fn internal_details_stay_out_of_the_body() {
        let err = ApiError::from(AnswerServiceError::Storage(StorageError::Serialization(
            "column tags is not JSON".into(),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn service_kinds_map_to_status_codes() {
        let conflict = ApiError::from(AnswerServiceError::SessionConflict);
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let down = ApiError::from(SessionServiceError::Storage(StorageError::Connection(
            "pool timed out".into(),
        )));
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
