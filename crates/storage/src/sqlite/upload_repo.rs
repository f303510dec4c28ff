use qbank_core::model::{UploadId, UploadRecord};
use sqlx::Row;

use super::SqliteDocumentStore;
use super::mapping::{conn, i64_to_u64, ser, user_id};
use crate::repository::{StorageError, UploadRepository};

fn map_upload_row(row: &sqlx::sqlite::SqliteRow) -> Result<UploadRecord, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let file_type: String = row.try_get("file_type").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    let progress: i64 = row.try_get("progress").map_err(ser)?;

    Ok(UploadRecord {
        id: UploadId::parse(&id).map_err(ser)?,
        user_id: user_id(row, "user_id")?,
        file_name: row.try_get("file_name").map_err(ser)?,
        stored_name: row.try_get("stored_name").map_err(ser)?,
        file_size: i64_to_u64("file_size", row.try_get::<i64, _>("file_size").map_err(ser)?)?,
        mime_type: row.try_get("mime_type").map_err(ser)?,
        file_type: file_type.parse().map_err(ser)?,
        status: status.parse().map_err(ser)?,
        progress: u8::try_from(progress).map_err(ser)?,
        error: row.try_get("error").map_err(ser)?,
        uploaded_at: row.try_get("uploaded_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl UploadRepository for SqliteDocumentStore {
    async fn insert_upload(&self, record: &UploadRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO uploads (
                id, user_id, file_name, stored_name, file_size, mime_type,
                file_type, status, progress, error, uploaded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(record.id.as_str())
        .bind(record.user_id.as_str())
        .bind(&record.file_name)
        .bind(&record.stored_name)
        .bind(i64::try_from(record.file_size).map_err(ser)?)
        .bind(&record.mime_type)
        .bind(record.file_type.as_str())
        .bind(record.status.as_str())
        .bind(i64::from(record.progress))
        .bind(&record.error)
        .bind(record.uploaded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;
        Ok(())
    }

    async fn get_upload(&self, id: &UploadId) -> Result<Option<UploadRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, user_id, file_name, stored_name, file_size, mime_type,
                file_type, status, progress, error, uploaded_at
            FROM uploads
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_upload_row).transpose()
    }
}
