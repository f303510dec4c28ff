use std::sync::Arc;

use qbank_core::model::{BankId, PracticeMode, Question, UserId};
use storage::repository::{QuestionQuery, QuestionRepository};

use crate::error::QuestionServiceError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of questions for a practice mode.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionListing {
    pub questions: Vec<Question>,
    pub total: u64,
    pub has_more: bool,
    /// False in timed mode: correct answers and explanations must be withheld.
    pub reveal_answers: bool,
}

/// Pages through question banks.
#[derive(Clone)]
pub struct QuestionService {
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// List questions in ascending id order.
    ///
    /// `limit` defaults to 10 and is clamped to 1..=100. Review mode only
    /// returns questions `user` answered incorrectly or flagged.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if repository access fails.
    pub async fn list(
        &self,
        user: &UserId,
        bank_id: Option<BankId>,
        mode: PracticeMode,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<QuestionListing, QuestionServiceError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0);
        let review_for = (mode == PracticeMode::Review).then(|| user.clone());

        let page = self
            .questions
            .list_questions(&QuestionQuery {
                bank_id,
                review_for,
                limit,
                offset,
            })
            .await?;

        tracing::debug!(
            user = user.as_str(),
            mode = mode.as_str(),
            returned = page.items.len(),
            total = page.total,
            "listed questions"
        );

        Ok(QuestionListing {
            has_more: page.has_more(offset),
            total: page.total,
            questions: page.items,
            reveal_answers: mode.reveals_answers(),
        })
    }
}
