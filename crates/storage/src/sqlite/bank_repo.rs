use qbank_core::model::{BankId, NewQuestionBank, QuestionBank};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{bank_id, conn, i64_to_u64, id_i64, ser, u32_from_i64, user_id};
use crate::repository::{BankRepository, StorageError};

fn map_bank_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionBank, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    let file_type: String = row.try_get("file_type").map_err(ser)?;

    Ok(QuestionBank {
        id: bank_id(row, "id")?,
        user_id: user_id(row, "user_id")?,
        name: row.try_get("name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        status: status.parse().map_err(ser)?,
        file_type: file_type.parse().map_err(ser)?,
        file_url: row.try_get("file_url").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl BankRepository for SqliteRepository {
    async fn insert_bank(&self, bank: &NewQuestionBank) -> Result<QuestionBank, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO question_banks (
                user_id, name, description, subject, total_questions,
                status, file_type, file_url, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, 0, 'uploading', ?5, ?6, ?7, ?7)
            ",
        )
        .bind(bank.user_id.as_str())
        .bind(&bank.name)
        .bind(&bank.description)
        .bind(&bank.subject)
        .bind(bank.file_type.as_str())
        .bind(&bank.file_url)
        .bind(bank.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let id = i64_to_u64("id", res.last_insert_rowid())?;
        Ok(bank.clone().assign_id(BankId::new(id)))
    }

    async fn get_bank(&self, id: BankId) -> Result<Option<QuestionBank>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, user_id, name, description, subject, total_questions,
                status, file_type, file_url, created_at, updated_at
            FROM question_banks
            WHERE id = ?1
            ",
        )
        .bind(id_i64("bank_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_bank_row).transpose()
    }

    async fn update_bank(&self, bank: &QuestionBank) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE question_banks
            SET name = ?2,
                description = ?3,
                subject = ?4,
                total_questions = ?5,
                status = ?6,
                file_url = ?7,
                updated_at = ?8
            WHERE id = ?1
            ",
        )
        .bind(id_i64("bank_id", bank.id.value())?)
        .bind(&bank.name)
        .bind(&bank.description)
        .bind(&bank.subject)
        .bind(i64::from(bank.total_questions))
        .bind(bank.status.as_str())
        .bind(&bank.file_url)
        .bind(bank.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
