//! Shared error types for the services crate.

use thiserror::Error;

use qbank_core::model::{
    AnalyticsError, AnswerError, AnswerId, BankError, BankId, ParseIdError, QuestionError,
    QuestionId, SessionId, SessionStateError, SessionStatus, UploadError,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::upload_service::BlobError;

/// Coarse classification the HTTP layer turns into a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Forbidden,
    Conflict,
    Unavailable,
    Internal,
}

fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::NotFound => ErrorKind::NotFound,
        StorageError::Conflict => ErrorKind::Conflict,
        StorageError::Connection(_) => ErrorKind::Unavailable,
        _ => ErrorKind::Internal,
    }
}

/// Errors emitted by `AnswerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnswerServiceError {
    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("answer {0} not found")]
    AnswerNotFound(AnswerId),
    #[error("not allowed to modify this record")]
    Forbidden,
    #[error("session is {0}, answers are only accepted while active")]
    SessionNotActive(SessionStatus),
    #[error("session {session} practises bank {expected}, question belongs to bank {actual}")]
    WrongBank {
        session: SessionId,
        expected: BankId,
        actual: BankId,
    },
    #[error("session changed while the answer was being recorded")]
    SessionConflict,
    #[error("invalid option id")]
    InvalidOption(#[source] ParseIdError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AnswerServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QuestionNotFound(_)
            | Self::SessionNotFound(_)
            | Self::AnswerNotFound(_)
            | Self::Answer(_) => ErrorKind::NotFound,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::SessionNotActive(_) | Self::WrongBank { .. } | Self::InvalidOption(_) => {
                ErrorKind::Validation
            }
            Self::SessionConflict => ErrorKind::Conflict,
            Self::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted by `SessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionServiceError {
    #[error("question bank {0} not found")]
    BankNotFound(BankId),
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session belongs to another user")]
    Forbidden,
    #[error("requested {requested} questions but the bank has {available}")]
    InvalidTotal { requested: u32, available: u32 },
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BankNotFound(_) | Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::InvalidTotal { .. } | Self::State(_) => ErrorKind::Validation,
            Self::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted by `QuestionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QuestionServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted by `AnalyticsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalyticsServiceError {
    #[error(transparent)]
    Range(#[from] AnalyticsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AnalyticsServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Range(_) => ErrorKind::Validation,
            Self::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted by `BankService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankServiceError {
    #[error("question bank {0} not found")]
    NotFound(BankId),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BankServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Bank(_) | Self::Question(_) => ErrorKind::Validation,
            Self::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted by `UploadService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UploadServiceError {
    #[error("upload not found")]
    NotFound,
    #[error(transparent)]
    Rejected(#[from] UploadError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl UploadServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Rejected(_) => ErrorKind::Validation,
            Self::Blob(_) => ErrorKind::Internal,
            Self::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_classify_by_cause() {
        let unavailable = AnswerServiceError::from(StorageError::Connection("down".into()));
        assert_eq!(unavailable.kind(), ErrorKind::Unavailable);

        let broken = SessionServiceError::from(StorageError::Serialization("bad row".into()));
        assert_eq!(broken.kind(), ErrorKind::Internal);

        let raced = SessionServiceError::from(StorageError::Conflict);
        assert_eq!(raced.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn domain_rejections_are_validation() {
        let err = SessionServiceError::from(SessionStateError::AlreadyCompleted);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            UploadServiceError::from(UploadError::EmptyFile).kind(),
            ErrorKind::Validation
        );
    }
}
