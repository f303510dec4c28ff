use std::sync::Arc;

use qbank_core::model::{
    AnswerId, Metadata, NewUserAnswer, OptionId, PracticeSession, QuestionId, SessionId,
    SessionStatus, UserAnswer, UserId,
};
use storage::repository::{
    AnswerRepository, QuestionRepository, SessionRepository, StorageError,
};

use crate::Clock;
use crate::activity_log::ActivityLog;
use crate::error::AnswerServiceError;

/// A learner's response to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub selected_option: String,
    /// Whole seconds spent on the question.
    pub time_spent: u32,
    pub is_flagged: bool,
    pub session_id: Option<SessionId>,
}

/// What the learner sees after answering.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub answer: UserAnswer,
    pub correct_answer: OptionId,
    pub explanation: Option<String>,
    pub next_question_id: Option<QuestionId>,
    pub session: Option<PracticeSession>,
}

/// Grades submissions and appends them to the answer log.
#[derive(Clone)]
pub struct AnswerService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    answers: Arc<dyn AnswerRepository>,
    sessions: Arc<dyn SessionRepository>,
    activity: ActivityLog,
}

impl AnswerService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        answers: Arc<dyn AnswerRepository>,
        sessions: Arc<dyn SessionRepository>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            clock,
            questions,
            answers,
            sessions,
            activity,
        }
    }

    /// Grade and store an answer, moving the session counters with it.
    ///
    /// Nothing is written unless the question, option and session all check
    /// out.
    ///
    /// # Errors
    ///
    /// Returns `AnswerServiceError::QuestionNotFound` or
    /// `AnswerServiceError::Answer` for an unknown question or option,
    /// `AnswerServiceError::SessionNotFound`, `AnswerServiceError::Forbidden`,
    /// `AnswerServiceError::SessionNotActive` or
    /// `AnswerServiceError::WrongBank` when the session cannot take the
    /// answer, and `AnswerServiceError::SessionConflict` if the session
    /// changed underneath the write.
    pub async fn submit(
        &self,
        user: &UserId,
        submission: AnswerSubmission,
    ) -> Result<AnswerOutcome, AnswerServiceError> {
        let selected =
            OptionId::new(submission.selected_option).map_err(AnswerServiceError::InvalidOption)?;
        let question = self
            .questions
            .get_question(submission.question_id)
            .await?
            .ok_or(AnswerServiceError::QuestionNotFound(submission.question_id))?;

        let graded = NewUserAnswer::grade(
            user.clone(),
            &question,
            selected,
            submission.time_spent,
            submission.is_flagged,
            submission.session_id,
            self.clock.now(),
        )?;

        if let Some(session_id) = submission.session_id {
            let session = self
                .sessions
                .get_session(session_id)
                .await?
                .ok_or(AnswerServiceError::SessionNotFound(session_id))?;
            if session.user_id() != user {
                return Err(AnswerServiceError::Forbidden);
            }
            if session.status() != SessionStatus::Active {
                return Err(AnswerServiceError::SessionNotActive(session.status()));
            }
            if session.bank_id() != question.bank_id {
                return Err(AnswerServiceError::WrongBank {
                    session: session_id,
                    expected: session.bank_id(),
                    actual: question.bank_id,
                });
            }
        }

        let recorded = self.answers.record_answer(&graded).await.map_err(|e| match e {
            StorageError::Conflict => AnswerServiceError::SessionConflict,
            other => AnswerServiceError::Storage(other),
        })?;
        let next_question_id = self
            .questions
            .next_question_id(question.bank_id, question.id)
            .await?;

        tracing::info!(
            user = user.as_str(),
            question = %question.id,
            answer = %recorded.answer.id,
            correct = recorded.answer.is_correct,
            "answer recorded"
        );
        self.activity
            .info(
                "answers",
                "answer submitted",
                Some(user),
                recorded.answer.session_id,
                Metadata::new()
                    .with("questionId", question.id.to_string())
                    .with("isCorrect", recorded.answer.is_correct)
                    .with("timeSpent", recorded.answer.time_spent),
            )
            .await;

        Ok(AnswerOutcome {
            answer: recorded.answer,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            next_question_id,
            session: recorded.session,
        })
    }

    /// Set or clear the review flag on one of the caller's answers.
    ///
    /// # Errors
    ///
    /// Returns `AnswerServiceError::AnswerNotFound` or
    /// `AnswerServiceError::Forbidden`.
    pub async fn set_flag(
        &self,
        user: &UserId,
        answer_id: AnswerId,
        flagged: bool,
    ) -> Result<UserAnswer, AnswerServiceError> {
        let answer = self
            .answers
            .get_answer(answer_id)
            .await?
            .ok_or(AnswerServiceError::AnswerNotFound(answer_id))?;
        if &answer.user_id != user {
            return Err(AnswerServiceError::Forbidden);
        }
        if answer.is_flagged == flagged {
            return Ok(answer);
        }
        let updated = self.answers.set_flag(answer_id, flagged).await?;
        tracing::debug!(user = user.as_str(), answer = %answer_id, flagged, "answer flag changed");
        Ok(updated)
    }
}
