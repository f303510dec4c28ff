use qbank_core::model::SystemLogRecord;

use super::SqliteDocumentStore;
use super::mapping::{conn, id_i64, to_json};
use crate::repository::{StorageError, SystemLogRepository};

#[async_trait::async_trait]
impl SystemLogRepository for SqliteDocumentStore {
    async fn append_log(&self, record: &SystemLogRecord) -> Result<(), StorageError> {
        let session_id = record
            .session_id
            .map(|s| id_i64("session_id", s.value()))
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO system_logs (
                level, message, service, user_id, session_id, metadata, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(record.level.as_str())
        .bind(&record.message)
        .bind(&record.service)
        .bind(record.user_id.as_ref().map(|u| u.as_str().to_owned()))
        .bind(session_id)
        .bind(to_json(&record.metadata)?)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
