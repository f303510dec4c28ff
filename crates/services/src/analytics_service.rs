use std::sync::Arc;

use chrono::{DateTime, Utc};

use qbank_core::model::analytics::aggregate;
use qbank_core::model::{AnalyticsReport, DateRange, PracticeSession, UserId};
use storage::repository::{AnswerRepository, SessionRepository};

use crate::error::AnalyticsServiceError;

pub const RECENT_SESSION_LIMIT: u32 = 5;

/// Performance report plus the sessions that produced it most recently.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSummary {
    pub report: AnalyticsReport,
    pub recent_sessions: Vec<PracticeSession>,
}

/// Builds per-user performance reports from the answer log.
#[derive(Clone)]
pub struct AnalyticsService {
    answers: Arc<dyn AnswerRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(answers: Arc<dyn AnswerRepository>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self { answers, sessions }
    }

    /// Aggregate every answer `user` gave between `from` and `to` inclusive.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsServiceError::Range` when `from` is after `to` and
    /// `AnalyticsServiceError::Storage` if repository access fails.
    pub async fn summary(
        &self,
        user: &UserId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<AnalyticsSummary, AnalyticsServiceError> {
        let range = DateRange::new(from, to)?;
        let facts = self.answers.answer_facts(user, range).await?;
        let report = aggregate(&facts);
        let recent_sessions = self
            .sessions
            .recent_sessions(user, RECENT_SESSION_LIMIT)
            .await?;

        tracing::debug!(
            user = user.as_str(),
            answers = facts.len(),
            sessions = recent_sessions.len(),
            "analytics computed"
        );

        Ok(AnalyticsSummary {
            report,
            recent_sessions,
        })
    }
}
