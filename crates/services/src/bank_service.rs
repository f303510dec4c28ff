use std::sync::Arc;

use qbank_core::model::{
    BankId, FileType, NewQuestionBank, Question, QuestionBank, QuestionDraft, UserId,
};
use storage::repository::{BankRepository, QuestionRepository, StorageError};

use crate::Clock;
use crate::error::BankServiceError;

/// Creates question banks and moves them through ingestion.
#[derive(Clone)]
pub struct BankService {
    clock: Clock,
    banks: Arc<dyn BankRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl BankService {
    #[must_use]
    pub fn new(
        clock: Clock,
        banks: Arc<dyn BankRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            clock,
            banks,
            questions,
        }
    }

    /// Register a new bank in the `uploading` state.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Bank` for a blank name.
    pub async fn create(
        &self,
        owner: UserId,
        name: impl Into<String>,
        file_type: FileType,
        description: Option<String>,
        subject: Option<String>,
    ) -> Result<QuestionBank, BankServiceError> {
        let draft = NewQuestionBank::new(owner, name, file_type, self.clock.now())?
            .with_description(description)
            .with_subject(subject);
        Ok(self.banks.insert_bank(&draft).await?)
    }

    /// # Errors
    ///
    /// Returns `BankServiceError::NotFound` or `BankServiceError::Bank` for an
    /// illegal transition.
    pub async fn start_processing(&self, id: BankId) -> Result<QuestionBank, BankServiceError> {
        let mut bank = self.load(id).await?;
        bank.start_processing(self.clock.now())?;
        self.banks.update_bank(&bank).await?;
        Ok(bank)
    }

    /// Validate and store one question.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Question` for invalid content and
    /// `BankServiceError::NotFound` when the bank does not exist.
    pub async fn add_question(&self, draft: QuestionDraft) -> Result<Question, BankServiceError> {
        let bank_id = draft.bank_id;
        let validated = draft.validate(self.clock.now())?;
        self.questions
            .insert_question(&validated)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => BankServiceError::NotFound(bank_id),
                other => other.into(),
            })
    }

    /// Mark a bank completed, stamping the number of stored questions.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::NotFound` or `BankServiceError::Bank` for an
    /// illegal transition.
    pub async fn finish(&self, id: BankId) -> Result<QuestionBank, BankServiceError> {
        let mut bank = self.load(id).await?;
        let total = self.questions.count_questions(id).await?;
        bank.complete(total, self.clock.now())?;
        self.banks.update_bank(&bank).await?;
        tracing::info!(bank = %id, total, "question bank completed");
        Ok(bank)
    }

    /// # Errors
    ///
    /// Returns `BankServiceError::NotFound` or `BankServiceError::Bank` for an
    /// illegal transition.
    pub async fn fail(&self, id: BankId) -> Result<QuestionBank, BankServiceError> {
        let mut bank = self.load(id).await?;
        bank.fail(self.clock.now())?;
        self.banks.update_bank(&bank).await?;
        tracing::warn!(bank = %id, "question bank ingestion failed");
        Ok(bank)
    }

    /// Create a bank and ingest `drafts` into it in one pass.
    ///
    /// The bank ends `completed`, or `error` if any draft is rejected.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while ingesting.
    pub async fn import(
        &self,
        owner: UserId,
        name: impl Into<String>,
        file_type: FileType,
        drafts: impl IntoIterator<Item = QuestionDraft>,
    ) -> Result<QuestionBank, BankServiceError> {
        let bank = self.create(owner, name, file_type, None, None).await?;
        self.start_processing(bank.id).await?;

        for mut draft in drafts {
            draft.bank_id = bank.id;
            if let Err(err) = self.add_question(draft).await {
                self.fail(bank.id).await?;
                return Err(err);
            }
        }

        self.finish(bank.id).await
    }

    async fn load(&self, id: BankId) -> Result<QuestionBank, BankServiceError> {
        self.banks
            .get_bank(id)
            .await?
            .ok_or(BankServiceError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbank_core::model::BankStatus;
    use qbank_core::time::{fixed_clock, fixed_now};
    use storage::fixtures::sample_questions;
    use storage::repository::InMemoryRepository;

    fn service() -> BankService {
        let repo = Arc::new(InMemoryRepository::new());
        BankService::new(fixed_clock(), repo.clone(), repo)
    }

    fn owner() -> UserId {
        UserId::new("author").unwrap()
    }

    #[tokio::test]
    async fn import_completes_with_question_count() {
        let service = service();
        let bank = service
            .import(owner(), "Step 1", FileType::Pdf, sample_questions(BankId::new(0)))
            .await
            .unwrap();
        assert_eq!(bank.status, BankStatus::Completed);
        assert_eq!(bank.total_questions, 2);
        assert_eq!(bank.updated_at, fixed_now());
    }

    #[tokio::test]
    async fn rejected_draft_marks_bank_failed() {
        let service = service();
        let mut drafts = sample_questions(BankId::new(0));
        drafts[1].correct_answer = "e".into();

        let err = service
            .import(owner(), "Broken", FileType::Docx, drafts)
            .await
            .unwrap_err();
        assert!(matches!(err, BankServiceError::Question(_)));

        let bank = service.load(BankId::new(1)).await.unwrap();
        assert_eq!(bank.status, BankStatus::Error);
    }

    #[tokio::test]
    async fn questions_need_an_existing_bank() {
        let err = service()
            .add_question(sample_questions(BankId::new(9)).remove(0))
            .await
            .unwrap_err();
        assert!(matches!(err, BankServiceError::NotFound(id) if id == BankId::new(9)));
    }
}
