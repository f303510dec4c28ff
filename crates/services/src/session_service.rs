use std::sync::Arc;

use qbank_core::model::{
    BankId, Metadata, NewPracticeSession, PracticeMode, PracticeSession, SessionId,
    SessionStateError, UserId,
};
use storage::repository::{BankRepository, QuestionRepository, SessionRepository};

use crate::Clock;
use crate::activity_log::ActivityLog;
use crate::error::SessionServiceError;

/// Request to open a practice session.
#[derive(Debug, Clone, PartialEq)]
pub struct StartSession {
    pub bank_id: BankId,
    pub mode: PracticeMode,
    pub total_questions: u32,
    pub metadata: Metadata,
}

/// Creates practice sessions and drives their pause/resume/complete lifecycle.
#[derive(Clone)]
pub struct SessionService {
    clock: Clock,
    banks: Arc<dyn BankRepository>,
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn SessionRepository>,
    activity: ActivityLog,
}

impl SessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        banks: Arc<dyn BankRepository>,
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn SessionRepository>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            clock,
            banks,
            questions,
            sessions,
            activity,
        }
    }

    /// Open a session against an existing bank.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::BankNotFound` for an unknown bank,
    /// `SessionServiceError::InvalidTotal` when more questions are requested
    /// than the bank holds and `SessionServiceError::State` for a zero total.
    pub async fn start(
        &self,
        user: &UserId,
        request: StartSession,
    ) -> Result<PracticeSession, SessionServiceError> {
        if self.banks.get_bank(request.bank_id).await?.is_none() {
            return Err(SessionServiceError::BankNotFound(request.bank_id));
        }
        if request.total_questions == 0 {
            return Err(SessionStateError::EmptySession.into());
        }
        let available = self.questions.count_questions(request.bank_id).await?;
        if request.total_questions > available {
            return Err(SessionServiceError::InvalidTotal {
                requested: request.total_questions,
                available,
            });
        }

        let draft = NewPracticeSession::new(
            user.clone(),
            request.bank_id,
            request.mode,
            request.total_questions,
            self.clock.now(),
        )?
        .with_metadata(request.metadata);
        let session = self.sessions.insert_session(&draft).await?;

        tracing::info!(
            user = user.as_str(),
            session = %session.id(),
            bank = %session.bank_id(),
            mode = session.mode().as_str(),
            "practice session started"
        );
        self.activity
            .info(
                "sessions",
                "practice session started",
                Some(user),
                Some(session.id()),
                Metadata::new()
                    .with("mode", session.mode().as_str())
                    .with("totalQuestions", session.total_questions()),
            )
            .await;

        Ok(session)
    }

    /// Fetch a session owned by `user`.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::NotFound` or `SessionServiceError::Forbidden`.
    pub async fn get(
        &self,
        user: &UserId,
        id: SessionId,
    ) -> Result<PracticeSession, SessionServiceError> {
        let session = self
            .sessions
            .get_session(id)
            .await?
            .ok_or(SessionServiceError::NotFound(id))?;
        if session.user_id() != user {
            return Err(SessionServiceError::Forbidden);
        }
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::State` unless the session is active.
    pub async fn pause(
        &self,
        user: &UserId,
        id: SessionId,
    ) -> Result<PracticeSession, SessionServiceError> {
        self.transition(user, id, "paused", |s, _| s.pause()).await
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::State` unless the session is paused.
    pub async fn resume(
        &self,
        user: &UserId,
        id: SessionId,
    ) -> Result<PracticeSession, SessionServiceError> {
        self.transition(user, id, "resumed", |s, _| s.resume()).await
    }

    /// Finish a session before every question is answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::State` if the session already completed.
    pub async fn complete(
        &self,
        user: &UserId,
        id: SessionId,
    ) -> Result<PracticeSession, SessionServiceError> {
        self.transition(user, id, "completed", |s, now| s.complete(now))
            .await
    }

    async fn transition<F>(
        &self,
        user: &UserId,
        id: SessionId,
        verb: &str,
        apply: F,
    ) -> Result<PracticeSession, SessionServiceError>
    where
        F: FnOnce(&mut PracticeSession, chrono::DateTime<chrono::Utc>) -> Result<(), SessionStateError>,
    {
        let mut session = self.get(user, id).await?;
        let prior = session.status();
        apply(&mut session, self.clock.now())?;
        // Compare-and-set against the status read above.
        self.sessions.save_status(&session, prior).await?;

        tracing::info!(user = user.as_str(), session = %id, "practice session {verb}");
        self.activity
            .info(
                "sessions",
                format!("practice session {verb}"),
                Some(user),
                Some(id),
                Metadata::new()
                    .with("from", prior.as_str())
                    .with("to", session.status().as_str()),
            )
            .await;

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbank_core::model::{FileType, NewQuestionBank, SessionStatus};
    use qbank_core::time::{fixed_clock, fixed_now};
    use storage::fixtures::sample_questions;
    use storage::repository::{InMemoryRepository, StorageError};

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    async fn service() -> (SessionService, BankId) {
        let repo = Arc::new(InMemoryRepository::new());
        let bank = repo
            .insert_bank(&NewQuestionBank::new(user(), "Boards", FileType::Pdf, fixed_now()).unwrap())
            .await
            .unwrap();
        for draft in sample_questions(bank.id) {
            repo.insert_question(&draft.validate(fixed_now()).unwrap())
                .await
                .unwrap();
        }
        let service = SessionService::new(
            fixed_clock(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            ActivityLog::new(fixed_clock(), repo),
        );
        (service, bank.id)
    }

    fn request(bank_id: BankId, total: u32) -> StartSession {
        StartSession {
            bank_id,
            mode: PracticeMode::Tutor,
            total_questions: total,
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn start_checks_bank_and_total() {
        let (service, bank_id) = service().await;

        let err = service.start(&user(), request(BankId::new(99), 1)).await.unwrap_err();
        assert!(matches!(err, SessionServiceError::BankNotFound(_)));

        let err = service.start(&user(), request(bank_id, 3)).await.unwrap_err();
        assert!(matches!(
            err,
            SessionServiceError::InvalidTotal {
                requested: 3,
                available: 2
            }
        ));

        let err = service.start(&user(), request(bank_id, 0)).await.unwrap_err();
        assert!(matches!(
            err,
            SessionServiceError::State(SessionStateError::EmptySession)
        ));

        let session = service.start(&user(), request(bank_id, 2)).await.unwrap();
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.started_at(), fixed_now());
    }

    #[tokio::test]
    async fn lifecycle_and_ownership() {
        let (service, bank_id) = service().await;
        let session = service.start(&user(), request(bank_id, 1)).await.unwrap();
        let stranger = UserId::new("intruder").unwrap();

        assert!(matches!(
            service.pause(&stranger, session.id()).await,
            Err(SessionServiceError::Forbidden)
        ));

        let paused = service.pause(&user(), session.id()).await.unwrap();
        assert_eq!(paused.status(), SessionStatus::Paused);
        assert!(matches!(
            service.pause(&user(), session.id()).await,
            Err(SessionServiceError::State(SessionStateError::NotActive(_)))
        ));

        let resumed = service.resume(&user(), session.id()).await.unwrap();
        assert_eq!(resumed.status(), SessionStatus::Active);

        let done = service.complete(&user(), session.id()).await.unwrap();
        assert_eq!(done.completed_at(), Some(fixed_now()));
        assert!(matches!(
            service.complete(&user(), session.id()).await,
            Err(SessionServiceError::State(SessionStateError::AlreadyCompleted))
        ));
        assert!(matches!(
            service.get(&user(), SessionId::new(404)).await,
            Err(SessionServiceError::NotFound(_))
        ));

        let stale = SessionServiceError::from(StorageError::Conflict);
        assert_eq!(stale.kind(), crate::ErrorKind::Conflict);
    }
}
