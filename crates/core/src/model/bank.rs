use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{BankId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BankError {
    #[error("bank name cannot be empty")]
    EmptyName,

    #[error("cannot move bank from {from} to {to}")]
    InvalidTransition { from: BankStatus, to: BankStatus },

    #[error("unknown bank status: {0}")]
    UnknownStatus(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
}

/// Processing state of an uploaded bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

impl BankStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BankStatus::Uploading => "uploading",
            BankStatus::Processing => "processing",
            BankStatus::Completed => "completed",
            BankStatus::Error => "error",
        }
    }

    fn can_move_to(self, next: BankStatus) -> bool {
        matches!(
            (self, next),
            (BankStatus::Uploading, BankStatus::Processing)
                | (BankStatus::Processing, BankStatus::Completed)
                | (BankStatus::Uploading | BankStatus::Processing, BankStatus::Error)
        )
    }
}

impl fmt::Display for BankStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BankStatus {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(Self::Uploading),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(BankError::UnknownStatus(other.to_owned())),
        }
    }
}

/// Source document format a bank was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Xlsx,
}

impl FileType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Xlsx => "xlsx",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileType::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// Map a MIME type onto a supported file type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        [FileType::Pdf, FileType::Docx, FileType::Xlsx]
            .into_iter()
            .find(|t| t.mime_type().eq_ignore_ascii_case(essence))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(BankError::UnsupportedFileType(other.to_owned())),
        }
    }
}

/// Bank metadata before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestionBank {
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub file_type: FileType,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewQuestionBank {
    /// # Errors
    ///
    /// Returns `BankError::EmptyName` if the name is blank.
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        file_type: FileType,
        now: DateTime<Utc>,
    ) -> Result<Self, BankError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(BankError::EmptyName);
        }
        Ok(Self {
            user_id,
            name,
            description: None,
            subject: None,
            file_type,
            file_url: None,
            created_at: now,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject.filter(|s| !s.trim().is_empty());
        self
    }

    #[must_use]
    pub fn assign_id(self, id: BankId) -> QuestionBank {
        QuestionBank {
            id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            subject: self.subject,
            total_questions: 0,
            status: BankStatus::Uploading,
            file_type: self.file_type,
            file_url: self.file_url,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// A named collection of questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    pub id: BankId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub total_questions: u32,
    pub status: BankStatus,
    pub file_type: FileType,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuestionBank {
    fn transition(&mut self, next: BankStatus, now: DateTime<Utc>) -> Result<(), BankError> {
        if !self.status.can_move_to(next) {
            return Err(BankError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `BankError::InvalidTransition` unless the bank is uploading.
    pub fn start_processing(&mut self, now: DateTime<Utc>) -> Result<(), BankError> {
        self.transition(BankStatus::Processing, now)
    }

    /// Mark processing done and record how many questions the bank holds.
    ///
    /// # Errors
    ///
    /// Returns `BankError::InvalidTransition` unless the bank is processing.
    pub fn complete(&mut self, total_questions: u32, now: DateTime<Utc>) -> Result<(), BankError> {
        self.transition(BankStatus::Completed, now)?;
        self.total_questions = total_questions;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `BankError::InvalidTransition` if the bank already finished.
    pub fn fail(&mut self, now: DateTime<Utc>) -> Result<(), BankError> {
        self.transition(BankStatus::Error, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn bank() -> QuestionBank {
        NewQuestionBank::new(UserId::new("u1").unwrap(), "Step 1", FileType::Pdf, fixed_now())
            .unwrap()
            .assign_id(BankId::new(1))
    }

    #[test]
    fn bank_moves_through_processing() {
        let mut bank = bank();
        assert_eq!(bank.status, BankStatus::Uploading);
        bank.start_processing(fixed_now()).unwrap();
        bank.complete(12, fixed_now()).unwrap();
        assert_eq!(bank.status, BankStatus::Completed);
        assert_eq!(bank.total_questions, 12);
    }

    #[test]
    fn completed_bank_cannot_fail() {
        let mut bank = bank();
        bank.start_processing(fixed_now()).unwrap();
        bank.complete(1, fixed_now()).unwrap();
        assert_eq!(
            bank.fail(fixed_now()).unwrap_err(),
            BankError::InvalidTransition {
                from: BankStatus::Completed,
                to: BankStatus::Error
            }
        );
    }

    #[test]
    fn cannot_complete_without_processing() {
        let mut bank = bank();
        assert!(bank.complete(3, fixed_now()).is_err());
        assert_eq!(bank.total_questions, 0);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = NewQuestionBank::new(UserId::new("u1").unwrap(), " ", FileType::Pdf, fixed_now())
            .unwrap_err();
        assert_eq!(err, BankError::EmptyName);
    }

    #[test]
    fn file_type_from_mime_ignores_parameters() {
        assert_eq!(
            FileType::from_mime("application/pdf; charset=binary"),
            Some(FileType::Pdf)
        );
        assert_eq!(FileType::from_mime("image/png"), None);
    }
}
