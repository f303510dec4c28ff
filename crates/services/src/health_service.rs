use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use qbank_core::model::Metadata;
use serde::Serialize;
use storage::repository::Datastore;

use crate::Clock;
use crate::activity_log::ActivityLog;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Reachability of each backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatastoreHealth {
    pub primary: bool,
    pub documents: bool,
    pub cache: bool,
}

impl DatastoreHealth {
    #[must_use]
    pub fn all_up(&self) -> bool {
        self.primary && self.documents && self.cache
    }
}

/// Resident memory of this process against total system memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the service was built.
    pub uptime: f64,
    pub memory: Option<MemoryUsage>,
    pub version: String,
    pub environment: String,
    pub databases: DatastoreHealth,
    /// Milliseconds spent producing this report.
    pub response_time: u64,
}

/// Probes every datastore and reports process vitals.
#[derive(Clone)]
pub struct HealthService {
    clock: Clock,
    started: Instant,
    version: String,
    environment: String,
    primary: Arc<dyn Datastore>,
    documents: Arc<dyn Datastore>,
    cache: Arc<dyn Datastore>,
    activity: ActivityLog,
}

impl HealthService {
    #[must_use]
    pub fn new(
        clock: Clock,
        environment: impl Into<String>,
        primary: Arc<dyn Datastore>,
        documents: Arc<dyn Datastore>,
        cache: Arc<dyn Datastore>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            clock,
            started: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            environment: environment.into(),
            primary,
            documents,
            cache,
            activity,
        }
    }

    /// Ping all datastores concurrently. Never fails; unreachable stores
    /// degrade the report instead.
    pub async fn check(&self) -> HealthReport {
        let began = Instant::now();
        let (primary, documents, cache) = tokio::join!(
            ping("primary", self.primary.as_ref()),
            ping("documents", self.documents.as_ref()),
            ping("cache", self.cache.as_ref()),
        );
        let databases = DatastoreHealth {
            primary,
            documents,
            cache,
        };
        let status = if databases.all_up() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        let report = HealthReport {
            status,
            timestamp: self.clock.now(),
            uptime: self.started.elapsed().as_secs_f64(),
            memory: memory_usage().await,
            version: self.version.clone(),
            environment: self.environment.clone(),
            databases,
            response_time: u64::try_from(began.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        let metadata = Metadata::new()
            .with("responseTime", report.response_time as f64)
            .with(
                "memoryUsage",
                f64::from(report.memory.map_or(0, |m| m.percentage)),
            );
        match status {
            HealthStatus::Healthy => {
                self.activity
                    .info("health", "system health: healthy", None, None, metadata)
                    .await;
            }
            HealthStatus::Degraded => {
                tracing::warn!(?databases, "health check degraded");
                self.activity
                    .warn("health", "system health: degraded", None, metadata)
                    .await;
            }
        }

        report
    }
}

async fn ping(name: &str, store: &dyn Datastore) -> bool {
    match tokio::time::timeout(PING_TIMEOUT, store.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::warn!(datastore = name, error = %err, "datastore ping failed");
            false
        }
        Err(_) => {
            tracing::warn!(datastore = name, "datastore ping timed out");
            false
        }
    }
}

/// Reads `/proc`; `None` on platforms without it.
async fn memory_usage() -> Option<MemoryUsage> {
    let status = tokio::fs::read_to_string("/proc/self/status").await.ok()?;
    let meminfo = tokio::fs::read_to_string("/proc/meminfo").await.ok()?;
    let used = kb_field(&status, "VmRSS:")? * 1024;
    let total = kb_field(&meminfo, "MemTotal:")? * 1024;
    if total == 0 {
        return None;
    }
    let percentage = u8::try_from((used.saturating_mul(100) / total).min(100)).ok()?;
    Some(MemoryUsage {
        used,
        total,
        percentage,
    })
}

fn kb_field(text: &str, key: &str) -> Option<u64> {
    text.lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qbank_core::model::LogLevel;
    use qbank_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, StorageError};

    struct Offline;

    #[async_trait]
    impl Datastore for Offline {
        async fn ping(&self) -> Result<(), StorageError> {
            Err(StorageError::Connection("refused".into()))
        }
    }

    fn service(cache: Arc<dyn Datastore>) -> (HealthService, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new());
        let service = HealthService::new(
            fixed_clock(),
            "test",
            repo.clone(),
            repo.clone(),
            cache,
            ActivityLog::new(fixed_clock(), repo.clone()),
        );
        (service, repo)
    }

    #[tokio::test]
    async fn all_stores_up_is_healthy() {
        let repo = Arc::new(InMemoryRepository::new());
        let (service, logs) = service(repo);
        let report = service.check().await;

        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.databases.all_up());
        assert_eq!(report.timestamp, fixed_now());
        assert_eq!(report.environment, "test");
        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(logs.logs().unwrap()[0].level, LogLevel::Info);
    }

    #[tokio::test]
    async fn one_store_down_is_degraded() {
        let (service, logs) = service(Arc::new(Offline));
        let report = service.check().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.databases.primary);
        assert!(!report.databases.cache);
        assert_eq!(logs.logs().unwrap()[0].level, LogLevel::Warn);
    }

    #[test]
    fn parses_proc_fields() {
        let status = "Name:\tqbank\nVmRSS:\t   2048 kB\n";
        assert_eq!(kb_field(status, "VmRSS:"), Some(2048));
        assert_eq!(kb_field(status, "MemTotal:"), None);
    }
}
