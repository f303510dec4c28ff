//! Wire shapes for the JSON API. All keys are camelCase.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use qbank_core::model::{
    AnalyticsReport, AnswerId, BankId, Difficulty, Metadata, OptionId, PracticeMode,
    PracticeSession, Question, QuestionId, QuestionOption, SessionId, SessionStatus, UploadRecord,
    UploadStatus, UserAnswer,
};
use serde::{Deserialize, Serialize};
use services::{AnalyticsSummary, AnswerOutcome};

use crate::error::ApiError;

//
// ─── REQUESTS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsQuery {
    pub question_bank_id: Option<BankId>,
    pub mode: Option<PracticeMode>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: QuestionId,
    pub selected_option: String,
    /// Whole seconds; negative values fail to deserialize.
    pub time_spent: u32,
    #[serde(default)]
    pub is_flagged: bool,
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRequest {
    pub is_flagged: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub question_bank_id: BankId,
    #[serde(default)]
    pub mode: PracticeMode,
    pub total_questions: u32,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl AnalyticsQuery {
    /// Parse both bounds. A bare date covers that whole UTC day.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for a value that is neither RFC 3339
    /// nor `YYYY-MM-DD`.
    pub fn bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ApiError> {
        let from = self
            .from
            .as_deref()
            .map(|raw| parse_bound(raw, NaiveTime::MIN))
            .transpose()?;
        // Last representable instant of the day; stored timestamps carry nanoseconds.
        let end_of_day =
            NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
        let to = self
            .to
            .as_deref()
            .map(|raw| parse_bound(raw, end_of_day))
            .transpose()?;
        Ok((from, to))
    }
}

fn parse_bound(raw: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|day| day.and_time(time_of_day).and_utc())
        .map_err(|_| {
            ApiError::Validation(format!(
                "invalid date {raw:?}; expected RFC 3339 or YYYY-MM-DD"
            ))
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusQuery {
    pub upload_id: Option<String>,
}

//
// ─── RESPONSES ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub question_bank_id: BankId,
    pub question_text: String,
    pub options: Vec<QuestionOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<OptionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub subject: Option<String>,
    pub system: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl QuestionView {
    #[must_use]
    pub fn new(question: Question, reveal_answers: bool) -> Self {
        Self {
            id: question.id,
            question_bank_id: question.bank_id,
            question_text: question.text,
            options: question.options,
            correct_answer: reveal_answers.then_some(question.correct_answer),
            explanation: question.explanation.filter(|_| reveal_answers),
            subject: question.subject,
            system: question.system,
            difficulty: question.difficulty,
            tags: question.tags,
            images: question.images,
            created_at: question.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsResponse {
    pub success: bool,
    pub questions: Vec<QuestionView>,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: SessionId,
    pub question_bank_id: BankId,
    pub mode: PracticeMode,
    pub status: SessionStatus,
    pub total_questions: u32,
    pub completed_questions: u32,
    pub correct_answers: u32,
    pub time_spent: u64,
    pub accuracy: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

impl From<&PracticeSession> for SessionView {
    fn from(s: &PracticeSession) -> Self {
        Self {
            id: s.id(),
            question_bank_id: s.bank_id(),
            mode: s.mode(),
            status: s.status(),
            total_questions: s.total_questions(),
            completed_questions: s.completed_questions(),
            correct_answers: s.correct_answers(),
            time_spent: s.time_spent(),
            accuracy: s.accuracy(),
            started_at: s.started_at(),
            completed_at: s.completed_at(),
            metadata: s.metadata().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub session: SessionView,
}

impl From<PracticeSession> for SessionResponse {
    fn from(session: PracticeSession) -> Self {
        Self {
            success: true,
            session: SessionView::from(&session),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub success: bool,
    pub is_correct: bool,
    pub correct_answer: OptionId,
    pub explanation: Option<String>,
    pub next_question_id: Option<QuestionId>,
    pub answer_id: AnswerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
}

impl From<AnswerOutcome> for AnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        Self {
            success: true,
            is_correct: outcome.answer.is_correct,
            correct_answer: outcome.correct_answer,
            explanation: outcome.explanation,
            next_question_id: outcome.next_question_id,
            answer_id: outcome.answer.id,
            session: outcome.session.as_ref().map(SessionView::from),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub session_id: Option<SessionId>,
    pub selected_option: OptionId,
    pub is_correct: bool,
    pub time_spent: u32,
    pub is_flagged: bool,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FlagResponse {
    pub success: bool,
    pub answer: AnswerView,
}

impl From<UserAnswer> for FlagResponse {
    fn from(a: UserAnswer) -> Self {
        Self {
            success: true,
            answer: AnswerView {
                id: a.id,
                question_id: a.question_id,
                session_id: a.session_id,
                selected_option: a.selected_option,
                is_correct: a.is_correct,
                time_spent: a.time_spent,
                is_flagged: a.is_flagged,
                answered_at: a.answered_at,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: AnalyticsReport,
    pub recent_sessions: Vec<SessionView>,
}

impl From<AnalyticsSummary> for AnalyticsResponse {
    fn from(summary: AnalyticsSummary) -> Self {
        Self {
            success: true,
            report: summary.report,
            recent_sessions: summary.recent_sessions.iter().map(SessionView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub status: UploadStatus,
    pub message: &'static str,
}

impl From<UploadRecord> for UploadResponse {
    fn from(record: UploadRecord) -> Self {
        Self {
            success: true,
            upload_id: record.id.to_string(),
            file_name: record.file_name,
            file_size: record.file_size,
            file_type: record.mime_type,
            status: record.status,
            message: record.status.message(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub success: bool,
    pub upload_id: String,
    pub file_name: String,
    pub status: UploadStatus,
    pub progress: u8,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<UploadRecord> for UploadStatusResponse {
    fn from(record: UploadRecord) -> Self {
        Self {
            success: true,
            upload_id: record.id.to_string(),
            file_name: record.file_name,
            status: record.status,
            progress: record.progress,
            message: record.status.message(),
            error: record.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbank_core::model::DateRange;

    #[test]
    fn date_only_bounds_cover_whole_days() {
        let query = AnalyticsQuery {
            from: Some("2024-03-01".into()),
            to: Some("2024-03-02".into()),
        };
        let (from, to) = query.bounds().unwrap();
        assert_eq!(from.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(
            to.unwrap().to_rfc3339(),
            "2024-03-02T23:59:59.999999999+00:00"
        );
    }

    #[test]
    fn date_only_to_keeps_answers_from_the_last_millisecond() {
        let query = AnalyticsQuery {
            from: None,
            to: Some("2024-01-01".into()),
        };
        let (from, to) = query.bounds().unwrap();
        let range = DateRange::new(from, to).unwrap();

        let late = "2024-01-01T23:59:59.999500Z".parse::<DateTime<Utc>>().unwrap();
        assert!(range.contains(late));
        let next_day = "2024-01-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(!range.contains(next_day));
    }

    #[test]
    fn rfc3339_bounds_are_normalised_to_utc() {
        let query = AnalyticsQuery {
            from: Some("2024-03-01T10:00:00+02:00".into()),
            to: None,
        };
        let (from, to) = query.bounds().unwrap();
        assert_eq!(from.unwrap().to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert!(to.is_none());
    }

    #[test]
    fn garbage_bounds_are_rejected() {
        let query = AnalyticsQuery {
            from: Some("last tuesday".into()),
            to: None,
        };
        assert!(matches!(query.bounds(), Err(ApiError::Validation(_))));
    }
}
