use qbank_core::model::{
    NewPracticeSession, PracticeSession, SessionId, SessionStatus, UserId,
};

use super::SqliteRepository;
use super::mapping::{conn, i64_to_u64, id_i64, map_session_row, to_json};
use crate::repository::{SessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    id, user_id, bank_id, mode, total_questions, completed_questions,
    correct_answers, time_spent, status, started_at, completed_at, metadata
";

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(
        &self,
        session: &NewPracticeSession,
    ) -> Result<PracticeSession, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO practice_sessions (
                user_id, bank_id, mode, total_questions, completed_questions,
                correct_answers, time_spent, status, started_at, completed_at, metadata
            )
            VALUES (?1, ?2, ?3, ?4, 0, 0, 0, 'active', ?5, NULL, ?6)
            ",
        )
        .bind(session.user_id.as_str())
        .bind(id_i64("bank_id", session.bank_id.value())?)
        .bind(session.mode.as_str())
        .bind(i64::from(session.total_questions))
        .bind(session.started_at)
        .bind(to_json(&session.metadata)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        let id = SessionId::new(i64_to_u64("id", res.last_insert_rowid())?);
        Ok(session.clone().assign_id(id))
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<PracticeSession>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM practice_sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("session_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_session_row).transpose()
    }

    async fn save_status(
        &self,
        session: &PracticeSession,
        expected: SessionStatus,
    ) -> Result<(), StorageError> {
        let id = id_i64("session_id", session.id().value())?;
        let res = sqlx::query(
            r"
            UPDATE practice_sessions
            SET status = ?2, completed_at = ?3
            WHERE id = ?1 AND status = ?4
            ",
        )
        .bind(id)
        .bind(session.status().as_str())
        .bind(session.completed_at())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 1 {
            return Ok(());
        }
        let exists = sqlx::query("SELECT 1 FROM practice_sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Err(if exists.is_some() {
            StorageError::Conflict
        } else {
            StorageError::NotFound
        })
    }

    async fn recent_sessions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<PracticeSession>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM practice_sessions
             WHERE user_id = ?1
             ORDER BY started_at DESC, id DESC
             LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(map_session_row(&row)?);
        }
        Ok(sessions)
    }
}
