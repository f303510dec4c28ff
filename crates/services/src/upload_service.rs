use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use qbank_core::model::{Metadata, UploadId, UploadRecord, UploadRules, UserId};
use rand::Rng;
use storage::repository::UploadRepository;
use thiserror::Error;

use crate::Clock;
use crate::activity_log::ActivityLog;
use crate::error::UploadServiceError;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Errors raised by blob backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BlobError {
    #[error("invalid blob name: {0:?}")]
    InvalidName(String),
    #[error("blob store lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Byte storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `BlobError` if the bytes cannot be stored.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError>;

    /// Remove a blob; missing blobs are not an error.
    ///
    /// # Errors
    ///
    /// Returns `BlobError` on backend failures.
    async fn delete(&self, name: &str) -> Result<(), BlobError>;
}

fn checked_name(name: &str) -> Result<&str, BlobError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(BlobError::InvalidName(name.to_owned()));
    }
    Ok(name)
}

/// Files under a single directory on local disk.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Use `root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `BlobError::Io` if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.root.join(checked_name(name)?);
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        match tokio::fs::remove_file(self.root.join(checked_name(name)?)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Blob store for tests.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `BlobError::Poisoned` if the lock is poisoned.
    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let blobs = self.blobs.lock().map_err(|_| BlobError::Poisoned)?;
        Ok(blobs.get(name).cloned())
    }

    /// # Errors
    ///
    /// Returns `BlobError::Poisoned` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, BlobError> {
        Ok(self.blobs.lock().map_err(|_| BlobError::Poisoned)?.len())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let name = checked_name(name)?;
        let mut blobs = self.blobs.lock().map_err(|_| BlobError::Poisoned)?;
        blobs.insert(name.to_owned(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        let mut blobs = self.blobs.lock().map_err(|_| BlobError::Poisoned)?;
        blobs.remove(name);
        Ok(())
    }
}

/// Accepts question-bank source files and tracks their processing status.
#[derive(Clone)]
pub struct UploadService {
    clock: Clock,
    rules: UploadRules,
    uploads: Arc<dyn UploadRepository>,
    blobs: Arc<dyn BlobStore>,
    activity: ActivityLog,
}

impl UploadService {
    #[must_use]
    pub fn new(
        clock: Clock,
        rules: UploadRules,
        uploads: Arc<dyn UploadRepository>,
        blobs: Arc<dyn BlobStore>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            clock,
            rules,
            uploads,
            blobs,
            activity,
        }
    }

    #[must_use]
    pub fn rules(&self) -> UploadRules {
        self.rules
    }

    /// Validate, store and register an uploaded file.
    ///
    /// Nothing is written unless the file passes the upload rules.
    ///
    /// # Errors
    ///
    /// Returns `UploadServiceError::Rejected` for a disallowed file,
    /// `UploadServiceError::Blob` if the bytes cannot be written and
    /// `UploadServiceError::Storage` if the record cannot be stored.
    pub async fn accept(
        &self,
        user: &UserId,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadRecord, UploadServiceError> {
        let checked = match self.rules.check(file_name, mime_type, bytes.len() as u64) {
            Ok(checked) => checked,
            Err(err) => {
                tracing::info!(user = user.as_str(), file_name, error = %err, "upload rejected");
                self.activity
                    .warn(
                        "upload",
                        format!("upload rejected: {err}"),
                        Some(user),
                        Metadata::new().with("fileName", file_name).with("mimeType", mime_type),
                    )
                    .await;
                return Err(err.into());
            }
        };

        let now = self.clock.now();
        let id = UploadId::from_parts(now.timestamp_millis(), &random_suffix());
        let record = checked.into_record(id, user.clone(), now);

        self.blobs.put(&record.stored_name, bytes).await?;
        if let Err(err) = self.uploads.insert_upload(&record).await {
            if let Err(cleanup) = self.blobs.delete(&record.stored_name).await {
                tracing::warn!(blob = %record.stored_name, error = %cleanup, "failed to remove orphaned blob");
            }
            return Err(err.into());
        }

        tracing::info!(
            user = user.as_str(),
            upload = %record.id,
            size = record.file_size,
            file_type = record.file_type.as_str(),
            "upload accepted"
        );
        self.activity
            .info(
                "upload",
                "file uploaded",
                Some(user),
                None,
                Metadata::new()
                    .with("uploadId", record.id.to_string())
                    .with("fileName", record.file_name.as_str())
                    .with("fileType", record.file_type.as_str()),
            )
            .await;

        Ok(record)
    }

    /// Look up one of the caller's uploads.
    ///
    /// Malformed ids and uploads owned by someone else read as missing.
    ///
    /// # Errors
    ///
    /// Returns `UploadServiceError::NotFound` or
    /// `UploadServiceError::Storage`.
    pub async fn status(
        &self,
        user: &UserId,
        raw_id: &str,
    ) -> Result<UploadRecord, UploadServiceError> {
        let id = UploadId::parse(raw_id).map_err(|_| UploadServiceError::NotFound)?;
        match self.uploads.get_upload(&id).await? {
            Some(record) if &record.user_id == user => Ok(record),
            _ => Err(UploadServiceError::NotFound),
        }
    }
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..ID_SUFFIX_LEN)
        .map(|_| char::from(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbank_core::model::{FileType, UploadError, UploadStatus};
    use qbank_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn service(max_bytes: u64) -> (UploadService, Arc<InMemoryBlobStore>) {
        let repo = Arc::new(InMemoryRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new());
        let service = UploadService::new(
            fixed_clock(),
            UploadRules::with_max_bytes(max_bytes),
            repo.clone(),
            blobs.clone(),
            ActivityLog::new(fixed_clock(), repo),
        );
        (service, blobs)
    }

    #[tokio::test]
    async fn accepted_upload_is_pending_and_stored() {
        let (service, blobs) = service(1024);
        let record = service
            .accept(&user(), "Cardio Pack (v2).pdf", FileType::Pdf.mime_type(), b"%PDF-1.7")
            .await
            .unwrap();

        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(record.progress, 0);
        assert_eq!(record.uploaded_at, fixed_now());
        assert!(record.id.as_str().starts_with("upload_1700000000000_"));
        assert_eq!(record.stored_name, format!("{}_cardio_pack_v2_.pdf", record.id));
        assert_eq!(blobs.get(&record.stored_name).unwrap().as_deref(), Some(&b"%PDF-1.7"[..]));

        let looked_up = service.status(&user(), record.id.as_str()).await.unwrap();
        assert_eq!(looked_up, record);
    }

    #[tokio::test]
    async fn rejected_files_never_reach_storage() {
        let (service, blobs) = service(4);

        let err = service
            .accept(&user(), "big.pdf", FileType::Pdf.mime_type(), b"too large")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadServiceError::Rejected(UploadError::TooLarge { size: 9, max: 4 })
        ));

        let err = service
            .accept(&user(), "notes.txt", "text/plain", b"hi")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadServiceError::Rejected(UploadError::UnsupportedMimeType(_))
        ));
        assert_eq!(blobs.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn status_hides_foreign_and_malformed_ids() {
        let (service, _) = service(1024);
        let record = service
            .accept(&user(), "deck.xlsx", FileType::Xlsx.mime_type(), b"PK")
            .await
            .unwrap();

        let stranger = UserId::new("someone-else").unwrap();
        assert!(matches!(
            service.status(&stranger, record.id.as_str()).await,
            Err(UploadServiceError::NotFound)
        ));
        assert!(matches!(
            service.status(&user(), "../etc/passwd").await,
            Err(UploadServiceError::NotFound)
        ));
    }

    #[test]
    fn suffix_is_base36() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(UploadId::parse(&format!("upload_1_{suffix}")).is_ok());
    }

    #[tokio::test]
    async fn local_store_writes_and_deletes() {
        let dir = std::env::temp_dir().join(format!("qbank-blobs-{}", random_suffix()));
        let store = LocalBlobStore::open(&dir).await.unwrap();
        store.put("a.pdf", b"bytes").await.unwrap();
        assert_eq!(tokio::fs::read(dir.join("a.pdf")).await.unwrap(), b"bytes");
        store.delete("a.pdf").await.unwrap();
        store.delete("a.pdf").await.unwrap();
        assert!(matches!(
            store.put("../escape.pdf", b"x").await,
            Err(BlobError::InvalidName(_))
        ));
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
