#![forbid(unsafe_code)]

pub mod activity_log;
pub mod analytics_service;
pub mod answer_service;
pub mod app_services;
pub mod bank_service;
pub mod error;
pub mod health_service;
pub mod question_service;
pub mod session_service;
pub mod upload_service;

pub use qbank_core::Clock;

pub use activity_log::ActivityLog;
pub use analytics_service::{AnalyticsService, AnalyticsSummary};
pub use answer_service::{AnswerOutcome, AnswerService, AnswerSubmission};
pub use app_services::{AppServices, ServiceSettings};
pub use bank_service::BankService;
pub use error::{
    AnalyticsServiceError, AnswerServiceError, AppServicesError, BankServiceError, ErrorKind,
    QuestionServiceError, SessionServiceError, UploadServiceError,
};
pub use health_service::{DatastoreHealth, HealthReport, HealthService, HealthStatus};
pub use question_service::{QuestionListing, QuestionService};
pub use session_service::{SessionService, StartSession};
pub use upload_service::{BlobError, BlobStore, InMemoryBlobStore, LocalBlobStore, UploadService};
