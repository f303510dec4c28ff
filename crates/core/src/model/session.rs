use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{BankId, SessionId, UserId};
use crate::model::metadata::Metadata;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("a session needs at least one question")]
    EmptySession,

    #[error("session is {0}, expected active")]
    NotActive(SessionStatus),

    #[error("session is {0}, expected paused")]
    NotPaused(SessionStatus),

    #[error("session already completed")]
    AlreadyCompleted,

    #[error("all {0} questions in this session are already answered")]
    Exhausted(u32),

    #[error("completed ({completed}) exceeds total ({total})")]
    CountOverflow { completed: u32, total: u32 },

    #[error("correct answers ({correct}) exceed completed ({completed})")]
    CorrectOverflow { correct: u32, completed: u32 },

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("unknown value: {0}")]
    Unknown(String),
}

//
// ─── MODE / STATUS ─────────────────────────────────────────────────────────────
//

/// Practice variants differing in feedback timing and time pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PracticeMode {
    /// Immediate feedback after each answer.
    #[default]
    Tutor,
    /// Feedback withheld until the end, under time pressure.
    Timed,
    /// Revisit previously missed or flagged questions.
    Review,
}

impl PracticeMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PracticeMode::Tutor => "tutor",
            PracticeMode::Timed => "timed",
            PracticeMode::Review => "review",
        }
    }

    /// Whether answers and explanations may be shown before the session ends.
    #[must_use]
    pub fn reveals_answers(self) -> bool {
        !matches!(self, PracticeMode::Timed)
    }
}

impl fmt::Display for PracticeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PracticeMode {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tutor" => Ok(Self::Tutor),
            "timed" => Ok(Self::Timed),
            "review" => Ok(Self::Review),
            other => Err(SessionStateError::Unknown(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(SessionStateError::Unknown(other.to_owned())),
        }
    }
}

//
// ─── NEW SESSION ───────────────────────────────────────────────────────────────
//

/// A session that has been validated but not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPracticeSession {
    pub user_id: UserId,
    pub bank_id: BankId,
    pub mode: PracticeMode,
    pub total_questions: u32,
    pub started_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl NewPracticeSession {
    /// # Errors
    ///
    /// Returns `SessionStateError::EmptySession` when `total_questions` is zero.
    pub fn new(
        user_id: UserId,
        bank_id: BankId,
        mode: PracticeMode,
        total_questions: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionStateError> {
        if total_questions == 0 {
            return Err(SessionStateError::EmptySession);
        }
        Ok(Self {
            user_id,
            bank_id,
            mode,
            total_questions,
            started_at: now,
            metadata: Metadata::new(),
        })
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn assign_id(self, id: SessionId) -> PracticeSession {
        PracticeSession {
            id,
            user_id: self.user_id,
            bank_id: self.bank_id,
            mode: self.mode,
            total_questions: self.total_questions,
            completed_questions: 0,
            correct_answers: 0,
            time_spent: 0,
            status: SessionStatus::Active,
            started_at: self.started_at,
            completed_at: None,
            metadata: self.metadata,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Progress of a practice run.
///
/// `completed_questions <= total_questions` and `correct_answers <= completed_questions`
/// hold for every value this type can hold.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeSession {
    id: SessionId,
    user_id: UserId,
    bank_id: BankId,
    mode: PracticeMode,
    total_questions: u32,
    completed_questions: u32,
    correct_answers: u32,
    time_spent: u64,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    metadata: Metadata,
}

impl PracticeSession {
    /// Rehydrate a session from storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the persisted counters or timestamps
    /// break the session invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        bank_id: BankId,
        mode: PracticeMode,
        total_questions: u32,
        completed_questions: u32,
        correct_answers: u32,
        time_spent: u64,
        status: SessionStatus,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        metadata: Metadata,
    ) -> Result<Self, SessionStateError> {
        if total_questions == 0 {
            return Err(SessionStateError::EmptySession);
        }
        if completed_questions > total_questions {
            return Err(SessionStateError::CountOverflow {
                completed: completed_questions,
                total: total_questions,
            });
        }
        if correct_answers > completed_questions {
            return Err(SessionStateError::CorrectOverflow {
                correct: correct_answers,
                completed: completed_questions,
            });
        }
        if completed_at.is_some_and(|done| done < started_at) {
            return Err(SessionStateError::InvalidTimeRange);
        }

        Ok(Self {
            id,
            user_id,
            bank_id,
            mode,
            total_questions,
            completed_questions,
            correct_answers,
            time_spent,
            status,
            started_at,
            completed_at,
            metadata,
        })
    }

    /// Count one answered question.
    ///
    /// When the last question is answered the session completes and
    /// `completed_at` is stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NotActive` unless the session is active and
    /// `SessionStateError::Exhausted` if every question was already answered.
    pub fn record_answer(
        &mut self,
        is_correct: bool,
        time_spent_secs: u32,
        now: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        if self.status != SessionStatus::Active {
            return Err(SessionStateError::NotActive(self.status));
        }
        if self.completed_questions >= self.total_questions {
            return Err(SessionStateError::Exhausted(self.total_questions));
        }

        self.completed_questions += 1;
        if is_correct {
            self.correct_answers += 1;
        }
        self.time_spent = self.time_spent.saturating_add(u64::from(time_spent_secs));

        if self.completed_questions == self.total_questions {
            self.finish(now);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::NotActive` unless the session is active.
    pub fn pause(&mut self) -> Result<(), SessionStateError> {
        if self.status != SessionStatus::Active {
            return Err(SessionStateError::NotActive(self.status));
        }
        self.status = SessionStatus::Paused;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionStateError::NotPaused` unless the session is paused.
    pub fn resume(&mut self) -> Result<(), SessionStateError> {
        if self.status != SessionStatus::Paused {
            return Err(SessionStateError::NotPaused(self.status));
        }
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// End the session early.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::AlreadyCompleted` if it already ended.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        if self.status == SessionStatus::Completed {
            return Err(SessionStateError::AlreadyCompleted);
        }
        self.finish(now);
        Ok(())
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now.max(self.started_at));
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn bank_id(&self) -> BankId {
        self.bank_id
    }

    #[must_use]
    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn completed_questions(&self) -> u32 {
        self.completed_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.total_questions - self.completed_questions
    }

    /// Seconds spent across all recorded answers.
    #[must_use]
    pub fn time_spent(&self) -> u64 {
        self.time_spent
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Session accuracy; 0 when nothing has been answered.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        crate::model::analytics::ratio(
            u64::from(self.correct_answers),
            u64::from(self.completed_questions),
        )
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
