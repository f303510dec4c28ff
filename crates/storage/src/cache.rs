use async_trait::async_trait;
use qbank_core::model::{BankId, Question, QuestionId, ValidatedQuestion};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::repository::{Datastore, Page, QuestionQuery, QuestionRepository, StorageError};

/// Read-through cache in front of a question repository.
///
/// Questions never change after insert, so entries are never invalidated or
/// evicted; the map grows to at most one entry per stored question.
///
/// As a [`Datastore`] the cache lives in process memory: its ping fails only
/// when the cache lock is poisoned. Health degradation in practice comes from
/// the database pools.
pub struct CachedQuestions {
    inner: Arc<dyn QuestionRepository>,
    entries: Mutex<HashMap<QuestionId, Question>>,
}

impl CachedQuestions {
    #[must_use]
    pub fn new(inner: Arc<dyn QuestionRepository>) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the cache lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.guard()?.len())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, HashMap<QuestionId, Question>>, StorageError> {
        self.entries
            .lock()
            .map_err(|e| StorageError::Connection(format!("question cache: {e}")))
    }

    fn remember(&self, question: &Question) -> Result<(), StorageError> {
        self.guard()?.insert(question.id, question.clone());
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for CachedQuestions {
    async fn insert_question(&self, question: &ValidatedQuestion) -> Result<Question, StorageError> {
        let stored = self.inner.insert_question(question).await?;
        self.remember(&stored)?;
        Ok(stored)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let hit = self.guard()?.get(&id).cloned();
        if hit.is_some() {
            return Ok(hit);
        }
        let fetched = self.inner.get_question(id).await?;
        if let Some(question) = &fetched {
            self.remember(question)?;
        }
        Ok(fetched)
    }

    async fn list_questions(&self, query: &QuestionQuery) -> Result<Page<Question>, StorageError> {
        self.inner.list_questions(query).await
    }

    async fn count_questions(&self, bank_id: BankId) -> Result<u32, StorageError> {
        self.inner.count_questions(bank_id).await
    }

    async fn next_question_id(
        &self,
        bank_id: BankId,
        after: QuestionId,
    ) -> Result<Option<QuestionId>, StorageError> {
        self.inner.next_question_id(bank_id, after).await
    }
}

#[async_trait]
impl Datastore for CachedQuestions {
    async fn ping(&self) -> Result<(), StorageError> {
        self.guard().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{BankRepository, InMemoryRepository};
    use qbank_core::model::{Difficulty, FileType, NewQuestionBank, QuestionDraft, UserId};
    use qbank_core::time::fixed_now;

    #[tokio::test]
    async fn reads_fill_the_cache_once() {
        let repo = InMemoryRepository::new();
        let bank = repo
            .insert_bank(
                &NewQuestionBank::new(UserId::new("u1").unwrap(), "B", FileType::Docx, fixed_now())
                    .unwrap(),
            )
            .await
            .unwrap();
        let stored = repo
            .insert_question(
                &QuestionDraft {
                    bank_id: bank.id,
                    text: "Q".into(),
                    options: vec![
                        ("a".into(), "A".into(), "x".into()),
                        ("b".into(), "B".into(), "y".into()),
                    ],
                    correct_answer: "a".into(),
                    explanation: None,
                    subject: None,
                    system: None,
                    difficulty: Difficulty::Easy,
                    tags: Vec::new(),
                    images: Vec::new(),
                }
                .validate(fixed_now())
                .unwrap(),
            )
            .await
            .unwrap();

        let cache = CachedQuestions::new(Arc::new(repo));
        assert_eq!(cache.len().unwrap(), 0);
        assert_eq!(cache.get_question(stored.id).await.unwrap(), Some(stored.clone()));
        assert_eq!(cache.len().unwrap(), 1);
        cache.get_question(stored.id).await.unwrap();
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.get_question(QuestionId::new(99)).await.unwrap(), None);
        assert_eq!(cache.len().unwrap(), 1);
        cache.ping().await.unwrap();
    }

    #[tokio::test]
    async fn ping_fails_only_on_a_poisoned_lock() {
        let cache = CachedQuestions::new(Arc::new(InMemoryRepository::new()));
        cache.ping().await.unwrap();

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _held = cache.entries.lock().unwrap();
            panic!("poison the cache lock");
        }));
        assert!(matches!(cache.ping().await, Err(StorageError::Connection(_))));
    }
}
