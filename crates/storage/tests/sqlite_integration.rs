use chrono::Duration;
use qbank_core::model::{
    BankId, DateRange, Difficulty, FileType, LogLevel, Metadata, NewPracticeSession,
    NewQuestionBank, NewUserAnswer, OptionId, PracticeMode, Question, QuestionId, SessionId,
    SessionStatus, SystemLogRecord, UploadId, UploadRules, UploadStatus, UserId,
};
use qbank_core::time::fixed_now;
use storage::fixtures::sample_questions;
use storage::repository::{
    AnswerRepository, BankRepository, Datastore, QuestionQuery, QuestionRepository,
    SessionRepository, Storage, StorageError, SystemLogRepository, UploadRepository,
};
use storage::sqlite::{SqliteDocumentStore, SqliteRepository};

fn user() -> UserId {
    UserId::new("user-1").unwrap()
}

async fn primary(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seeded(name: &str) -> (SqliteRepository, BankId, Vec<Question>) {
    let repo = primary(name).await;
    let bank = repo
        .insert_bank(&NewQuestionBank::new(user(), "Boards", FileType::Pdf, fixed_now()).unwrap())
        .await
        .unwrap();
    let mut questions = Vec::new();
    for draft in sample_questions(bank.id) {
        questions.push(
            repo.insert_question(&draft.validate(fixed_now()).unwrap())
                .await
                .unwrap(),
        );
    }
    (repo, bank.id, questions)
}

fn answer(q: &Question, pick: &str, session: Option<SessionId>, minutes: i64) -> NewUserAnswer {
    NewUserAnswer::grade(
        user(),
        q,
        OptionId::new(pick).unwrap(),
        30,
        false,
        session,
        fixed_now() + Duration::minutes(minutes),
    )
    .unwrap()
}

#[tokio::test]
async fn questions_round_trip_with_ordered_options() {
    let (repo, bank_id, qs) = seeded("memdb_questions").await;

    let fetched = repo.get_question(qs[0].id).await.unwrap().expect("question");
    assert_eq!(fetched, qs[0]);
    let letters: Vec<_> = fetched.options.iter().map(|o| o.letter.as_str()).collect();
    assert_eq!(letters, vec!["A", "B", "C", "D"]);
    assert_eq!(fetched.tags, vec!["STEMI", "ECG", "Chest Pain"]);

    assert_eq!(repo.count_questions(bank_id).await.unwrap(), 2);
    assert_eq!(
        repo.next_question_id(bank_id, qs[0].id).await.unwrap(),
        Some(qs[1].id)
    );
    assert_eq!(repo.next_question_id(bank_id, qs[1].id).await.unwrap(), None);
    assert_eq!(repo.get_question(QuestionId::new(404)).await.unwrap(), None);

    let page = repo
        .list_questions(&QuestionQuery {
            bank_id: Some(bank_id),
            review_for: None,
            limit: 1,
            offset: 1,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, qs[1].id);
    assert_eq!(page.items[0].options.len(), 4);
    assert!(!page.has_more(1));
}

#[tokio::test]
async fn question_for_missing_bank_is_rejected() {
    let repo = primary("memdb_orphan").await;
    let draft = sample_questions(BankId::new(77)).remove(0);
    let err = repo
        .insert_question(&draft.validate(fixed_now()).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn answers_move_session_counters_atomically() {
    let (repo, bank_id, qs) = seeded("memdb_answers").await;
    let session = repo
        .insert_session(
            &NewPracticeSession::new(user(), bank_id, PracticeMode::Tutor, 2, fixed_now())
                .unwrap()
                .with_metadata(Metadata::new().with("source", "test")),
        )
        .await
        .unwrap();

    let first = repo
        .record_answer(&answer(&qs[0], "b", Some(session.id()), 1))
        .await
        .unwrap();
    assert!(first.answer.is_correct);
    let snapshot = first.session.expect("session snapshot");
    assert_eq!(snapshot.completed_questions(), 1);
    assert_eq!(snapshot.correct_answers(), 1);
    assert_eq!(snapshot.time_spent(), 30);
    assert_eq!(snapshot.status(), SessionStatus::Active);

    let second = repo
        .record_answer(&answer(&qs[1], "a", Some(session.id()), 2))
        .await
        .unwrap();
    let done = second.session.expect("session snapshot");
    assert_eq!(done.status(), SessionStatus::Completed);
    assert_eq!(done.completed_at(), Some(fixed_now() + Duration::minutes(2)));
    assert_eq!(done.correct_answers(), 1);
    assert_eq!(done.metadata(), &Metadata::new().with("source", "test"));

    let err = repo
        .record_answer(&answer(&qs[1], "b", Some(session.id()), 3))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let facts = repo.answer_facts(&user(), DateRange::all()).await.unwrap();
    assert_eq!(facts.len(), 2);
}

#[tokio::test]
async fn paused_session_rejects_answers() {
    let (repo, bank_id, qs) = seeded("memdb_paused").await;
    let mut session = repo
        .insert_session(
            &NewPracticeSession::new(user(), bank_id, PracticeMode::Timed, 2, fixed_now()).unwrap(),
        )
        .await
        .unwrap();
    session.pause().unwrap();
    repo.save_status(&session, SessionStatus::Active).await.unwrap();

    let err = repo
        .record_answer(&answer(&qs[0], "b", Some(session.id()), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert!(repo.get_answer(qbank_core::model::AnswerId::new(1)).await.unwrap().is_none());

    let stale = repo.save_status(&session, SessionStatus::Active).await.unwrap_err();
    assert!(matches!(stale, StorageError::Conflict));

    let stored = repo.get_session(session.id()).await.unwrap().expect("session");
    assert_eq!(stored.status(), SessionStatus::Paused);
}

#[tokio::test]
async fn review_listing_and_analytics_facts() {
    let (repo, bank_id, qs) = seeded("memdb_review").await;
    let wrong = repo.record_answer(&answer(&qs[0], "a", None, 0)).await.unwrap();
    let right = repo
        .record_answer(&answer(&qs[1], "b", None, 60 * 24))
        .await
        .unwrap();

    let review = |user: UserId| QuestionQuery {
        bank_id: Some(bank_id),
        review_for: Some(user),
        limit: 10,
        offset: 0,
    };
    let page = repo.list_questions(&review(user())).await.unwrap();
    assert_eq!(page.items.iter().map(|q| q.id).collect::<Vec<_>>(), vec![qs[0].id]);

    let flagged = repo.set_flag(right.answer.id, true).await.unwrap();
    assert!(flagged.is_flagged);
    let page = repo.list_questions(&review(user())).await.unwrap();
    assert_eq!(page.total, 2);

    let other = repo
        .list_questions(&review(UserId::new("someone-else").unwrap()))
        .await
        .unwrap();
    assert!(other.items.is_empty());

    let first_day =
        DateRange::new(Some(fixed_now()), Some(fixed_now() + Duration::hours(1))).unwrap();
    let facts = repo.answer_facts(&user(), first_day).await.unwrap();
    assert_eq!(facts.len(), 1);
    assert!(!facts[0].is_correct);
    assert_eq!(facts[0].subject.as_deref(), Some("Cardiology"));
    assert_eq!(facts[0].difficulty, Some(Difficulty::Medium));

    assert!(matches!(
        repo.set_flag(qbank_core::model::AnswerId::new(999), true).await,
        Err(StorageError::NotFound)
    ));
    assert_eq!(wrong.answer.selected_option.as_str(), "a");
}

#[tokio::test]
async fn day_end_bound_keeps_sub_millisecond_answers() {
    let (repo, _, qs) = seeded("memdb_day_end").await;
    let day_start = fixed_now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    let late = day_start + Duration::days(1) - Duration::microseconds(500);
    let late_answer = NewUserAnswer::grade(
        user(),
        &qs[0],
        OptionId::new("b").unwrap(),
        30,
        false,
        None,
        late,
    )
    .unwrap();
    repo.record_answer(&late_answer).await.unwrap();

    let day_end = day_start + Duration::days(1) - Duration::nanoseconds(1);
    let whole_day = DateRange::new(Some(day_start), Some(day_end)).unwrap();
    let facts = repo.answer_facts(&user(), whole_day).await.unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].answered_at, late);
}

#[tokio::test]
async fn recent_sessions_are_newest_first() {
    let (repo, bank_id, _) = seeded("memdb_recent").await;
    for i in 0..3 {
        repo.insert_session(
            &NewPracticeSession::new(
                user(),
                bank_id,
                PracticeMode::Tutor,
                1,
                fixed_now() + Duration::minutes(i),
            )
            .unwrap(),
        )
        .await
        .unwrap();
    }
    let recent = repo.recent_sessions(&user(), 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].started_at() > recent[1].started_at());
}

#[tokio::test]
async fn document_store_keeps_uploads_and_logs() {
    let docs = SqliteDocumentStore::connect("sqlite:file:memdb_docs?mode=memory&cache=shared")
        .await
        .expect("connect");
    docs.migrate().await.expect("migrate");
    docs.ping().await.unwrap();

    let id = UploadId::from_parts(1_700_000_000_000, "k3j9x0a1b");
    let record = UploadRules::default()
        .check("Renal Pack.docx", FileType::Docx.mime_type(), 4096)
        .unwrap()
        .into_record(id.clone(), user(), fixed_now());
    docs.insert_upload(&record).await.unwrap();
    assert!(matches!(
        docs.insert_upload(&record).await,
        Err(StorageError::Conflict)
    ));

    let stored = docs.get_upload(&id).await.unwrap().expect("upload");
    assert_eq!(stored, record);
    assert_eq!(stored.status, UploadStatus::Pending);
    assert!(
        docs.get_upload(&UploadId::from_parts(1, "missing"))
            .await
            .unwrap()
            .is_none()
    );

    let log = SystemLogRecord::new(LogLevel::Info, "upload", "accepted", fixed_now())
        .for_user(&user())
        .with_metadata(Metadata::new().with("fileSize", 4096_u32));
    docs.append_log(&log).await.unwrap();
}

#[tokio::test]
async fn storage_wires_both_databases() {
    let storage = Storage::sqlite(
        "sqlite:file:memdb_wired_primary?mode=memory&cache=shared",
        "sqlite:file:memdb_wired_docs?mode=memory&cache=shared",
    )
    .await
    .expect("storage");

    storage.primary.ping().await.unwrap();
    storage.documents.ping().await.unwrap();
    storage.cache.ping().await.unwrap();

    let bank = storage
        .banks
        .insert_bank(&NewQuestionBank::new(user(), "Wired", FileType::Xlsx, fixed_now()).unwrap())
        .await
        .unwrap();
    let q = storage
        .questions
        .insert_question(
            &sample_questions(bank.id)
                .remove(1)
                .validate(fixed_now())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(storage.questions.get_question(q.id).await.unwrap(), Some(q));

    let mut bank = storage.banks.get_bank(bank.id).await.unwrap().expect("bank");
    bank.start_processing(fixed_now()).unwrap();
    bank.complete(1, fixed_now()).unwrap();
    storage.banks.update_bank(&bank).await.unwrap();
    let reloaded = storage.banks.get_bank(bank.id).await.unwrap().expect("bank");
    assert_eq!(reloaded.total_questions, 1);
    assert_eq!(reloaded.status, qbank_core::model::BankStatus::Completed);
}
