use async_trait::async_trait;
use qbank_core::model::{
    AnswerFact, AnswerId, BankId, DateRange, NewPracticeSession, NewQuestionBank, NewUserAnswer,
    PracticeSession, Question, QuestionBank, QuestionId, SessionId, SessionStatus,
    SystemLogRecord, UploadId, UploadRecord, UserAnswer, UserId, ValidatedQuestion,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::cache::CachedQuestions;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn has_more(&self, offset: u32) -> bool {
        u64::from(offset) + (self.items.len() as u64) < self.total
    }
}

/// Filter for question listings. Results are always in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionQuery {
    pub bank_id: Option<BankId>,
    /// Restrict to questions this user answered incorrectly or flagged.
    pub review_for: Option<UserId>,
    pub limit: u32,
    pub offset: u32,
}

/// Result of appending an answer: the stored row and, when the answer was
/// part of a session, the session after its counters moved.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAnswer {
    pub answer: UserAnswer,
    pub session: Option<PracticeSession>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Store a validated question with its options.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_question(&self, question: &ValidatedQuestion) -> Result<Question, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing id is `Ok(None)`.
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_questions(&self, query: &QuestionQuery) -> Result<Page<Question>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_questions(&self, bank_id: BankId) -> Result<u32, StorageError>;

    /// Smallest question id in `bank_id` greater than `after`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn next_question_id(
        &self,
        bank_id: BankId,
        after: QuestionId,
    ) -> Result<Option<QuestionId>, StorageError>;
}

#[async_trait]
pub trait BankRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be stored.
    async fn insert_bank(&self, bank: &NewQuestionBank) -> Result<QuestionBank, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing id is `Ok(None)`.
    async fn get_bank(&self, id: BankId) -> Result<Option<QuestionBank>, StorageError>;

    /// Persist status, counters and `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the bank does not exist.
    async fn update_bank(&self, bank: &QuestionBank) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Append an answer and, if it names a session, bump that session's
    /// counters in the same unit of work.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the session is no longer active
    /// or already has every question answered; nothing is written then.
    async fn record_answer(&self, answer: &NewUserAnswer) -> Result<RecordedAnswer, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing id is `Ok(None)`.
    async fn get_answer(&self, id: AnswerId) -> Result<Option<UserAnswer>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the answer does not exist.
    async fn set_flag(&self, id: AnswerId, flagged: bool) -> Result<UserAnswer, StorageError>;

    /// Every answer of `user_id` inside `range`, joined with question tags.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn answer_facts(
        &self,
        user_id: &UserId,
        range: DateRange,
    ) -> Result<Vec<AnswerFact>, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn insert_session(
        &self,
        session: &NewPracticeSession,
    ) -> Result<PracticeSession, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing id is `Ok(None)`.
    async fn get_session(&self, id: SessionId) -> Result<Option<PracticeSession>, StorageError>;

    /// Write `session`'s status and completion time if the stored status is
    /// still `expected`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the stored status moved on, or
    /// `StorageError::NotFound` if the session is gone.
    async fn save_status(
        &self,
        session: &PracticeSession,
        expected: SessionStatus,
    ) -> Result<(), StorageError>;

    /// Most recently started sessions first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn recent_sessions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<PracticeSession>, StorageError>;
}

#[async_trait]
pub trait UploadRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is already taken.
    async fn insert_upload(&self, record: &UploadRecord) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing id is `Ok(None)`.
    async fn get_upload(&self, id: &UploadId) -> Result<Option<UploadRecord>, StorageError>;
}

#[async_trait]
pub trait SystemLogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn append_log(&self, record: &SystemLogRecord) -> Result<(), StorageError>;
}

/// Liveness probe for a backing store.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store does not answer.
    async fn ping(&self) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

fn page<T: Clone>(all: Vec<&T>, limit: u32, offset: u32) -> Page<T> {
    let total = all.len() as u64;
    let items = all
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect();
    Page { items, total }
}

/// Answers and sessions share one lock so an answer and its counter update
/// land together.
#[derive(Default)]
struct PracticeTables {
    next_answer: u64,
    next_session: u64,
    answers: BTreeMap<AnswerId, UserAnswer>,
    sessions: BTreeMap<SessionId, PracticeSession>,
}

#[derive(Default)]
struct Catalog {
    next_question: u64,
    next_bank: u64,
    questions: BTreeMap<QuestionId, Question>,
    banks: BTreeMap<BankId, QuestionBank>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    catalog: Arc<Mutex<Catalog>>,
    practice: Arc<Mutex<PracticeTables>>,
    uploads: Arc<Mutex<HashMap<UploadId, UploadRecord>>>,
    logs: Arc<Mutex<Vec<SystemLogRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every log record written so far.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn logs(&self) -> Result<Vec<SystemLogRecord>, StorageError> {
        Ok(lock(&self.logs)?.clone())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_question(&self, question: &ValidatedQuestion) -> Result<Question, StorageError> {
        let mut catalog = lock(&self.catalog)?;
        if !catalog.banks.contains_key(&question.bank_id) {
            return Err(StorageError::NotFound);
        }
        catalog.next_question += 1;
        let stored = question
            .clone()
            .assign_id(QuestionId::new(catalog.next_question));
        catalog.questions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        Ok(lock(&self.catalog)?.questions.get(&id).cloned())
    }

    async fn list_questions(&self, query: &QuestionQuery) -> Result<Page<Question>, StorageError> {
        let review: Option<BTreeSet<QuestionId>> = match &query.review_for {
            Some(user) => {
                let practice = lock(&self.practice)?;
                Some(
                    practice
                        .answers
                        .values()
                        .filter(|a| &a.user_id == user && (!a.is_correct || a.is_flagged))
                        .map(|a| a.question_id)
                        .collect(),
                )
            }
            None => None,
        };

        let catalog = lock(&self.catalog)?;
        let matching = catalog
            .questions
            .values()
            .filter(|q| query.bank_id.is_none_or(|b| q.bank_id == b))
            .filter(|q| review.as_ref().is_none_or(|ids| ids.contains(&q.id)))
            .collect();
        Ok(page(matching, query.limit, query.offset))
    }

    async fn count_questions(&self, bank_id: BankId) -> Result<u32, StorageError> {
        let catalog = lock(&self.catalog)?;
        let count = catalog
            .questions
            .values()
            .filter(|q| q.bank_id == bank_id)
            .count();
        u32::try_from(count).map_err(|_| StorageError::Serialization("count overflow".into()))
    }

    async fn next_question_id(
        &self,
        bank_id: BankId,
        after: QuestionId,
    ) -> Result<Option<QuestionId>, StorageError> {
        let catalog = lock(&self.catalog)?;
        Ok(catalog
            .questions
            .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
            .map(|(_, q)| q)
            .find(|q| q.bank_id == bank_id)
            .map(|q| q.id))
    }
}

#[async_trait]
impl BankRepository for InMemoryRepository {
    async fn insert_bank(&self, bank: &NewQuestionBank) -> Result<QuestionBank, StorageError> {
        let mut catalog = lock(&self.catalog)?;
        catalog.next_bank += 1;
        let stored = bank.clone().assign_id(BankId::new(catalog.next_bank));
        catalog.banks.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_bank(&self, id: BankId) -> Result<Option<QuestionBank>, StorageError> {
        Ok(lock(&self.catalog)?.banks.get(&id).cloned())
    }

    async fn update_bank(&self, bank: &QuestionBank) -> Result<(), StorageError> {
        let mut catalog = lock(&self.catalog)?;
        let slot = catalog
            .banks
            .get_mut(&bank.id)
            .ok_or(StorageError::NotFound)?;
        *slot = bank.clone();
        Ok(())
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn record_answer(&self, answer: &NewUserAnswer) -> Result<RecordedAnswer, StorageError> {
        let mut practice = lock(&self.practice)?;

        let session = match answer.session_id() {
            Some(id) => {
                let stored = practice
                    .sessions
                    .get_mut(&id)
                    .ok_or(StorageError::NotFound)?;
                let mut updated = stored.clone();
                updated
                    .record_answer(answer.is_correct(), answer.time_spent(), answer.answered_at())
                    .map_err(|_| StorageError::Conflict)?;
                *stored = updated.clone();
                Some(updated)
            }
            None => None,
        };

        practice.next_answer += 1;
        let stored = answer
            .clone()
            .assign_id(AnswerId::new(practice.next_answer));
        practice.answers.insert(stored.id, stored.clone());

        Ok(RecordedAnswer {
            answer: stored,
            session,
        })
    }

    async fn get_answer(&self, id: AnswerId) -> Result<Option<UserAnswer>, StorageError> {
        Ok(lock(&self.practice)?.answers.get(&id).cloned())
    }

    async fn set_flag(&self, id: AnswerId, flagged: bool) -> Result<UserAnswer, StorageError> {
        let mut practice = lock(&self.practice)?;
        let answer = practice
            .answers
            .get_mut(&id)
            .ok_or(StorageError::NotFound)?;
        answer.is_flagged = flagged;
        Ok(answer.clone())
    }

    async fn answer_facts(
        &self,
        user_id: &UserId,
        range: DateRange,
    ) -> Result<Vec<AnswerFact>, StorageError> {
        let answers: Vec<UserAnswer> = lock(&self.practice)?
            .answers
            .values()
            .filter(|a| &a.user_id == user_id && range.contains(a.answered_at))
            .cloned()
            .collect();

        let catalog = lock(&self.catalog)?;
        Ok(answers
            .into_iter()
            .map(|a| {
                let question = catalog.questions.get(&a.question_id);
                AnswerFact {
                    answered_at: a.answered_at,
                    is_correct: a.is_correct,
                    time_spent: a.time_spent,
                    is_flagged: a.is_flagged,
                    subject: question.and_then(|q| q.subject.clone()),
                    system: question.and_then(|q| q.system.clone()),
                    difficulty: question.map(|q| q.difficulty),
                }
            })
            .collect())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(
        &self,
        session: &NewPracticeSession,
    ) -> Result<PracticeSession, StorageError> {
        if !lock(&self.catalog)?.banks.contains_key(&session.bank_id) {
            return Err(StorageError::NotFound);
        }
        let mut practice = lock(&self.practice)?;
        practice.next_session += 1;
        let stored = session
            .clone()
            .assign_id(SessionId::new(practice.next_session));
        practice.sessions.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<PracticeSession>, StorageError> {
        Ok(lock(&self.practice)?.sessions.get(&id).cloned())
    }

    async fn save_status(
        &self,
        session: &PracticeSession,
        expected: SessionStatus,
    ) -> Result<(), StorageError> {
        let mut practice = lock(&self.practice)?;
        let stored = practice
            .sessions
            .get_mut(&session.id())
            .ok_or(StorageError::NotFound)?;
        if stored.status() != expected {
            return Err(StorageError::Conflict);
        }
        *stored = session.clone();
        Ok(())
    }

    async fn recent_sessions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<PracticeSession>, StorageError> {
        let practice = lock(&self.practice)?;
        let mut sessions: Vec<PracticeSession> = practice
            .sessions
            .values()
            .filter(|s| s.user_id() == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.started_at()
                .cmp(&a.started_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        sessions.truncate(limit as usize);
        Ok(sessions)
    }
}

#[async_trait]
impl UploadRepository for InMemoryRepository {
    async fn insert_upload(&self, record: &UploadRecord) -> Result<(), StorageError> {
        let mut uploads = lock(&self.uploads)?;
        if uploads.contains_key(&record.id) {
            return Err(StorageError::Conflict);
        }
        uploads.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_upload(&self, id: &UploadId) -> Result<Option<UploadRecord>, StorageError> {
        Ok(lock(&self.uploads)?.get(id).cloned())
    }
}

#[async_trait]
impl SystemLogRepository for InMemoryRepository {
    async fn append_log(&self, record: &SystemLogRecord) -> Result<(), StorageError> {
        lock(&self.logs)?.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl Datastore for InMemoryRepository {
    async fn ping(&self) -> Result<(), StorageError> {
        lock(&self.catalog).map(|_| ())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
///
/// `primary` holds questions, banks, sessions and answers; `documents` holds
/// uploads and activity logs; `cache` fronts question reads.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub banks: Arc<dyn BankRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub uploads: Arc<dyn UploadRepository>,
    pub logs: Arc<dyn SystemLogRepository>,
    pub primary: Arc<dyn Datastore>,
    pub documents: Arc<dyn Datastore>,
    pub cache: Arc<dyn Datastore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(&InMemoryRepository::new())
    }

    /// Wire every repository to the given in-memory backend.
    #[must_use]
    pub fn from_in_memory(repo: &InMemoryRepository) -> Self {
        let cached = Arc::new(CachedQuestions::new(Arc::new(repo.clone())));
        Self {
            questions: cached.clone(),
            banks: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            uploads: Arc::new(repo.clone()),
            logs: Arc::new(repo.clone()),
            primary: Arc::new(repo.clone()),
            documents: Arc::new(repo.clone()),
            cache: cached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbank_core::model::{
        Difficulty, FileType, OptionId, PracticeMode, QuestionDraft, SessionStatus,
    };
    use qbank_core::time::fixed_now;

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    async fn seeded() -> (InMemoryRepository, QuestionBank, Vec<Question>) {
        let repo = InMemoryRepository::new();
        let bank = repo
            .insert_bank(&NewQuestionBank::new(user(), "Step 1", FileType::Pdf, fixed_now()).unwrap())
            .await
            .unwrap();
        let mut questions = Vec::new();
        for text in ["Q1", "Q2", "Q3"] {
            let draft = QuestionDraft {
                bank_id: bank.id,
                text: text.into(),
                options: vec![
                    ("a".into(), "A".into(), "one".into()),
                    ("b".into(), "B".into(), "two".into()),
                ],
                correct_answer: "b".into(),
                explanation: None,
                subject: None,
                system: None,
                difficulty: Difficulty::Medium,
                tags: Vec::new(),
                images: Vec::new(),
            };
            questions.push(
                repo.insert_question(&draft.validate(fixed_now()).unwrap())
                    .await
                    .unwrap(),
            );
        }
        (repo, bank, questions)
    }

    fn answer(q: &Question, pick: &str, session: Option<SessionId>) -> NewUserAnswer {
        NewUserAnswer::grade(
            user(),
            q,
            OptionId::new(pick).unwrap(),
            10,
            false,
            session,
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn next_question_skips_other_banks() {
        let (repo, bank, qs) = seeded().await;
        assert_eq!(
            repo.next_question_id(bank.id, qs[0].id).await.unwrap(),
            Some(qs[1].id)
        );
        assert_eq!(repo.next_question_id(bank.id, qs[2].id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn session_counters_move_with_answers() {
        let (repo, bank, qs) = seeded().await;
        let session = repo
            .insert_session(
                &NewPracticeSession::new(user(), bank.id, PracticeMode::Tutor, 1, fixed_now())
                    .unwrap(),
            )
            .await
            .unwrap();

        let recorded = repo
            .record_answer(&answer(&qs[0], "b", Some(session.id())))
            .await
            .unwrap();
        let snapshot = recorded.session.unwrap();
        assert_eq!(snapshot.completed_questions(), 1);
        assert_eq!(snapshot.status(), SessionStatus::Completed);

        let err = repo
            .record_answer(&answer(&qs[1], "a", Some(session.id())))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(repo.get_answer(AnswerId::new(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn review_listing_returns_missed_and_flagged() {
        let (repo, bank, qs) = seeded().await;
        repo.record_answer(&answer(&qs[0], "a", None)).await.unwrap();
        let right = repo.record_answer(&answer(&qs[1], "b", None)).await.unwrap();
        repo.record_answer(&answer(&qs[2], "b", None)).await.unwrap();
        repo.set_flag(right.answer.id, true).await.unwrap();

        let page = repo
            .list_questions(&QuestionQuery {
                bank_id: Some(bank.id),
                review_for: Some(user()),
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![qs[0].id, qs[1].id]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn save_status_detects_stale_writes() {
        let (repo, bank, _) = seeded().await;
        let mut session = repo
            .insert_session(
                &NewPracticeSession::new(user(), bank.id, PracticeMode::Timed, 2, fixed_now())
                    .unwrap(),
            )
            .await
            .unwrap();
        session.pause().unwrap();
        repo.save_status(&session, SessionStatus::Active).await.unwrap();
        let err = repo
            .save_status(&session, SessionStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[test]
    fn page_reports_has_more() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
        };
        assert!(page.has_more(0));
        assert!(page.has_more(2));
        assert!(!page.has_more(3));
    }
}
