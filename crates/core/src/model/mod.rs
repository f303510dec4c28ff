pub mod analytics;
mod answer;
mod bank;
mod ids;
mod log;
mod metadata;
mod question;
mod session;
mod upload;

pub use ids::{AnswerId, BankId, OptionId, ParseIdError, QuestionId, SessionId, UploadId, UserId};

pub use analytics::{
    AnalyticsError, AnalyticsReport, AnswerFact, DateRange, GroupStats, PerformanceMetrics,
    ProgressPoint, UNSPECIFIED,
};
pub use answer::{AnswerError, NewUserAnswer, UserAnswer};
pub use bank::{BankError, BankStatus, FileType, NewQuestionBank, QuestionBank};
pub use log::{LogLevel, SystemLogRecord};
pub use metadata::{MetaValue, Metadata};
pub use question::{
    Difficulty, Question, QuestionDraft, QuestionError, QuestionOption, ValidatedQuestion,
};
pub use session::{
    NewPracticeSession, PracticeMode, PracticeSession, SessionStateError, SessionStatus,
};
pub use upload::{
    CheckedUpload, DEFAULT_MAX_UPLOAD_BYTES, UploadError, UploadRecord, UploadRules,
    UploadStatus, sanitize_file_name,
};
