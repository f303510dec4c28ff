use std::path::PathBuf;
use std::sync::Arc;

use qbank_core::model::{DEFAULT_MAX_UPLOAD_BYTES, UploadRules};
use storage::repository::Storage;

use crate::Clock;
use crate::activity_log::ActivityLog;
use crate::analytics_service::AnalyticsService;
use crate::answer_service::AnswerService;
use crate::bank_service::BankService;
use crate::error::AppServicesError;
use crate::health_service::HealthService;
use crate::question_service::QuestionService;
use crate::session_service::SessionService;
use crate::upload_service::{BlobStore, LocalBlobStore, UploadService};

/// Process-level knobs shared by the services.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub clock: Clock,
    pub environment: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            clock: Clock::default(),
            environment: "development".to_owned(),
            upload_dir: PathBuf::from("./uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Builds every service once and hands out shared handles.
#[derive(Clone)]
pub struct AppServices {
    questions: Arc<QuestionService>,
    answers: Arc<AnswerService>,
    sessions: Arc<SessionService>,
    analytics: Arc<AnalyticsService>,
    banks: Arc<BankService>,
    uploads: Arc<UploadService>,
    health: Arc<HealthService>,
}

impl AppServices {
    /// Build services backed by the two `SQLite` databases and local disk.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if a database cannot be opened or migrated
    /// or the upload directory cannot be created.
    pub async fn new_sqlite(
        db_url: &str,
        docs_url: &str,
        settings: ServiceSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url, docs_url).await?;
        let blobs = LocalBlobStore::open(&settings.upload_dir).await?;
        tracing::info!(upload_dir = %blobs.root().display(), "storage ready");
        Ok(Self::from_storage(&storage, Arc::new(blobs), settings))
    }

    /// Wire services over already-open storage.
    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        blobs: Arc<dyn BlobStore>,
        settings: ServiceSettings,
    ) -> Self {
        let clock = settings.clock;
        let activity = ActivityLog::new(clock, Arc::clone(&storage.logs));

        let questions = Arc::new(QuestionService::new(Arc::clone(&storage.questions)));
        let answers = Arc::new(AnswerService::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.answers),
            Arc::clone(&storage.sessions),
            activity.clone(),
        ));
        let sessions = Arc::new(SessionService::new(
            clock,
            Arc::clone(&storage.banks),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sessions),
            activity.clone(),
        ));
        let analytics = Arc::new(AnalyticsService::new(
            Arc::clone(&storage.answers),
            Arc::clone(&storage.sessions),
        ));
        let banks = Arc::new(BankService::new(
            clock,
            Arc::clone(&storage.banks),
            Arc::clone(&storage.questions),
        ));
        let uploads = Arc::new(UploadService::new(
            clock,
            UploadRules::with_max_bytes(settings.max_upload_bytes),
            Arc::clone(&storage.uploads),
            blobs,
            activity.clone(),
        ));
        let health = Arc::new(HealthService::new(
            clock,
            settings.environment,
            Arc::clone(&storage.primary),
            Arc::clone(&storage.documents),
            Arc::clone(&storage.cache),
            activity,
        ));

        Self {
            questions,
            answers,
            sessions,
            analytics,
            banks,
            uploads,
            health,
        }
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionService> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn answers(&self) -> Arc<AnswerService> {
        Arc::clone(&self.answers)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn analytics(&self) -> Arc<AnalyticsService> {
        Arc::clone(&self.analytics)
    }

    #[must_use]
    pub fn banks(&self) -> Arc<BankService> {
        Arc::clone(&self.banks)
    }

    #[must_use]
    pub fn uploads(&self) -> Arc<UploadService> {
        Arc::clone(&self.uploads)
    }

    #[must_use]
    pub fn health(&self) -> Arc<HealthService> {
        Arc::clone(&self.health)
    }
}
