use chrono::{DateTime, Utc};
use qbank_core::model::{
    AnswerId, BankId, Metadata, OptionId, PracticeSession, QuestionId, SessionId, UserAnswer,
    UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn user_id(row: &SqliteRow, column: &str) -> Result<UserId, StorageError> {
    UserId::new(row.try_get::<String, _>(column).map_err(ser)?).map_err(ser)
}

pub(crate) fn question_id(row: &SqliteRow, column: &str) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64(
        "question_id",
        row.try_get::<i64, _>(column).map_err(ser)?,
    )?))
}

pub(crate) fn bank_id(row: &SqliteRow, column: &str) -> Result<BankId, StorageError> {
    Ok(BankId::new(i64_to_u64(
        "bank_id",
        row.try_get::<i64, _>(column).map_err(ser)?,
    )?))
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<UserAnswer, StorageError> {
    let session_id = row
        .try_get::<Option<i64>, _>("session_id")
        .map_err(ser)?
        .map(|v| i64_to_u64("session_id", v).map(SessionId::new))
        .transpose()?;

    Ok(UserAnswer {
        id: AnswerId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        user_id: user_id(row, "user_id")?,
        question_id: question_id(row, "question_id")?,
        session_id,
        selected_option: OptionId::new(row.try_get::<String, _>("selected_option").map_err(ser)?)
            .map_err(ser)?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        time_spent: u32_from_i64("time_spent", row.try_get::<i64, _>("time_spent").map_err(ser)?)?,
        is_flagged: row.try_get("is_flagged").map_err(ser)?,
        answered_at: row.try_get("answered_at").map_err(ser)?,
    })
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<PracticeSession, StorageError> {
    let mode: String = row.try_get("mode").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    let metadata: String = row.try_get("metadata").map_err(ser)?;
    let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at").map_err(ser)?;

    PracticeSession::from_persisted(
        SessionId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        user_id(row, "user_id")?,
        bank_id(row, "bank_id")?,
        mode.parse().map_err(ser)?,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        u32_from_i64(
            "completed_questions",
            row.try_get::<i64, _>("completed_questions").map_err(ser)?,
        )?,
        u32_from_i64(
            "correct_answers",
            row.try_get::<i64, _>("correct_answers").map_err(ser)?,
        )?,
        i64_to_u64("time_spent", row.try_get::<i64, _>("time_spent").map_err(ser)?)?,
        status.parse().map_err(ser)?,
        row.try_get("started_at").map_err(ser)?,
        completed_at,
        from_json::<Metadata>(&metadata)?,
    )
    .map_err(ser)
}
