use std::sync::Arc;

use qbank_core::model::{LogLevel, Metadata, SessionId, SystemLogRecord, UserId};
use storage::repository::SystemLogRepository;

use crate::Clock;

/// Best-effort audit trail written to the document store.
///
/// Write failures never reach the caller; they are reported through
/// `tracing` only.
#[derive(Clone)]
pub struct ActivityLog {
    clock: Clock,
    logs: Arc<dyn SystemLogRepository>,
}

impl ActivityLog {
    #[must_use]
    pub fn new(clock: Clock, logs: Arc<dyn SystemLogRepository>) -> Self {
        Self { clock, logs }
    }

    pub async fn info(
        &self,
        service: &str,
        message: impl Into<String>,
        user: Option<&UserId>,
        session: Option<SessionId>,
        metadata: Metadata,
    ) {
        self.write(LogLevel::Info, service, message, user, session, metadata)
            .await;
    }

    pub async fn warn(
        &self,
        service: &str,
        message: impl Into<String>,
        user: Option<&UserId>,
        metadata: Metadata,
    ) {
        self.write(LogLevel::Warn, service, message, user, None, metadata)
            .await;
    }

    async fn write(
        &self,
        level: LogLevel,
        service: &str,
        message: impl Into<String>,
        user: Option<&UserId>,
        session: Option<SessionId>,
        metadata: Metadata,
    ) {
        let mut record = SystemLogRecord::new(level, service, message, self.clock.now())
            .in_session(session)
            .with_metadata(metadata);
        if let Some(user) = user {
            record = record.for_user(user);
        }

        if let Err(err) = self.logs.append_log(&record).await {
            tracing::warn!(
                service,
                log_level = level.as_str(),
                error = %err,
                "failed to write activity log"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qbank_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, StorageError};

    struct BrokenLogs;

    #[async_trait]
    impl SystemLogRepository for BrokenLogs {
        async fn append_log(&self, _record: &SystemLogRecord) -> Result<(), StorageError> {
            Err(StorageError::Connection("document store offline".into()))
        }
    }

    #[tokio::test]
    async fn records_user_and_session() {
        let repo = Arc::new(InMemoryRepository::new());
        let log = ActivityLog::new(fixed_clock(), repo.clone());
        let user = UserId::new("user-1").unwrap();

        log.info(
            "answers",
            "answer submitted",
            Some(&user),
            Some(SessionId::new(3)),
            Metadata::new().with("isCorrect", true),
        )
        .await;

        let logs = repo.logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Info);
        assert_eq!(logs[0].user_id, Some(user));
        assert_eq!(logs[0].session_id, Some(SessionId::new(3)));
        assert_eq!(logs[0].created_at, fixed_now());
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let log = ActivityLog::new(fixed_clock(), Arc::new(BrokenLogs));
        log.warn("health", "degraded", None, Metadata::new()).await;
    }
}
