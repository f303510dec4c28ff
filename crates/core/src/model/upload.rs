use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::bank::FileType;
use crate::model::ids::{UploadId, UserId};

/// Default ceiling for a single uploaded document (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UploadError {
    #[error("no file provided")]
    MissingFile,

    #[error("file is empty")]
    EmptyFile,

    #[error("invalid file type {0}; please upload PDF, DOCX, or XLSX files")]
    UnsupportedMimeType(String),

    #[error("file too large: {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("file name {file_name:?} does not end in .{expected}")]
    ExtensionMismatch { file_name: String, expected: FileType },

    #[error("progress must be between 0 and 100, got {0}")]
    InvalidProgress(u8),

    #[error("unknown upload status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl UploadStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
        }
    }

    /// Human-readable line shown next to the status.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            UploadStatus::Pending => "File uploaded successfully. Processing will begin shortly.",
            UploadStatus::Uploading => "File is being uploaded...",
            UploadStatus::Processing => "File is being processed...",
            UploadStatus::Completed => "File processed successfully.",
            UploadStatus::Error => "File processing failed.",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "uploading" => Ok(Self::Uploading),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(UploadError::UnknownStatus(other.to_owned())),
        }
    }
}

/// Replace anything outside `[A-Za-z0-9.-]` with `_`, collapse repeats and lowercase.
///
/// Directory components are dropped and leading dots stripped, so the result
/// is always a plain file name inside the upload directory.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut out = String::with_capacity(base.len());
    for ch in base.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
            ch.to_ascii_lowercase()
        } else {
            '_'
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_start_matches('.');
    if trimmed.is_empty() || trimmed == "_" {
        "file".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Limits applied to every incoming document before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRules {
    max_bytes: u64,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadRules {
    #[must_use]
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check an incoming file against the allowed MIME types, size limit and
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns the first `UploadError` the file trips over.
    pub fn check(
        &self,
        file_name: &str,
        mime_type: &str,
        size: u64,
    ) -> Result<CheckedUpload, UploadError> {
        let file_type = FileType::from_mime(mime_type)
            .ok_or_else(|| UploadError::UnsupportedMimeType(mime_type.to_owned()))?;
        if size == 0 {
            return Err(UploadError::EmptyFile);
        }
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        if extension.as_deref() != Some(file_type.as_str()) {
            return Err(UploadError::ExtensionMismatch {
                file_name: file_name.to_owned(),
                expected: file_type,
            });
        }

        Ok(CheckedUpload {
            original_name: file_name.to_owned(),
            sanitized_name: sanitize_file_name(file_name),
            mime_type: file_type.mime_type().to_owned(),
            file_type,
            size,
        })
    }
}

/// A file that passed [`UploadRules::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedUpload {
    pub original_name: String,
    pub sanitized_name: String,
    pub mime_type: String,
    pub file_type: FileType,
    pub size: u64,
}

impl CheckedUpload {
    /// Name the blob is stored under; unique per upload id.
    #[must_use]
    pub fn stored_name(&self, id: &UploadId) -> String {
        format!("{id}_{}", self.sanitized_name)
    }

    #[must_use]
    pub fn into_record(self, id: UploadId, user_id: UserId, now: DateTime<Utc>) -> UploadRecord {
        UploadRecord {
            stored_name: self.stored_name(&id),
            id,
            user_id,
            file_name: self.original_name,
            file_size: self.size,
            mime_type: self.mime_type,
            file_type: self.file_type,
            status: UploadStatus::Pending,
            progress: 0,
            error: None,
            uploaded_at: now,
        }
    }
}

/// Tracking record for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub id: UploadId,
    pub user_id: UserId,
    pub file_name: String,
    pub stored_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub file_type: FileType,
    pub status: UploadStatus,
    /// Percent, 0..=100.
    pub progress: u8,
    pub error: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadRecord {
    /// # Errors
    ///
    /// Returns `UploadError::InvalidProgress` above 100.
    pub fn set_progress(&mut self, status: UploadStatus, progress: u8) -> Result<(), UploadError> {
        if progress > 100 {
            return Err(UploadError::InvalidProgress(progress));
        }
        self.status = status;
        self.progress = progress;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = UploadStatus::Error;
        self.error = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    const PDF: &str = "application/pdf";
    const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

    #[test]
    fn sanitize_replaces_and_collapses() {
        assert_eq!(sanitize_file_name("My Notes (v2).PDF"), "my_notes_v2_.pdf");
        assert_eq!(sanitize_file_name("a  b!!c.docx"), "a_b_c.docx");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..\\secret.xlsx"), "secret.xlsx");
        assert_eq!(sanitize_file_name(".."), "file");
    }

    #[test]
    fn accepts_supported_document() {
        let checked = UploadRules::default()
            .check("Cardio Deck.pdf", PDF, 2048)
            .unwrap();
        assert_eq!(checked.file_type, FileType::Pdf);
        assert_eq!(checked.sanitized_name, "cardio_deck.pdf");

        let id = UploadId::from_parts(1_700_000_000_000, "abc123xyz");
        let record = checked.into_record(id.clone(), UserId::new("u1").unwrap(), fixed_now());
        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(record.progress, 0);
        assert_eq!(record.stored_name, format!("{id}_cardio_deck.pdf"));
        assert_eq!(record.file_name, "Cardio Deck.pdf");
    }

    #[test]
    fn rejects_disallowed_mime() {
        let err = UploadRules::default()
            .check("photo.png", "image/png", 10)
            .unwrap_err();
        assert_eq!(err, UploadError::UnsupportedMimeType("image/png".into()));
    }

    #[test]
    fn rejects_oversized_file() {
        let rules = UploadRules::default();
        let err = rules
            .check("big.xlsx", XLSX, DEFAULT_MAX_UPLOAD_BYTES + 1)
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { max, .. } if max == DEFAULT_MAX_UPLOAD_BYTES));
        assert!(rules.check("edge.xlsx", XLSX, DEFAULT_MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn rejects_mismatched_extension() {
        let err = UploadRules::default()
            .check("sheet.pdf", XLSX, 10)
            .unwrap_err();
        assert!(matches!(err, UploadError::ExtensionMismatch { expected: FileType::Xlsx, .. }));
        assert!(UploadRules::default().check("noext", PDF, 10).is_err());
    }

    #[test]
    fn progress_is_bounded() {
        let mut record = UploadRules::default()
            .check("a.pdf", PDF, 1)
            .unwrap()
            .into_record(
                UploadId::from_parts(1, "x"),
                UserId::new("u1").unwrap(),
                fixed_now(),
            );
        assert!(record.set_progress(UploadStatus::Processing, 101).is_err());
        record.set_progress(UploadStatus::Processing, 45).unwrap();
        assert_eq!(record.status, UploadStatus::Processing);
        record.fail("parser crashed");
        assert_eq!(record.status, UploadStatus::Error);
        assert_eq!(record.error.as_deref(), Some("parser crashed"));
    }
}
