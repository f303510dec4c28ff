use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::{SessionId, UserId};
use crate::model::metadata::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Structured activity event kept in the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemLogRecord {
    pub level: LogLevel,
    pub message: String,
    /// Component that emitted the event, e.g. `"upload"` or `"answers"`.
    pub service: String,
    pub user_id: Option<UserId>,
    pub session_id: Option<SessionId>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl SystemLogRecord {
    #[must_use]
    pub fn new(
        level: LogLevel,
        service: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            service: service.into(),
            user_id: None,
            session_id: None,
            metadata: Metadata::new(),
            created_at: now,
        }
    }

    #[must_use]
    pub fn for_user(mut self, user_id: &UserId) -> Self {
        self.user_id = Some(user_id.clone());
        self
    }

    #[must_use]
    pub fn in_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}
