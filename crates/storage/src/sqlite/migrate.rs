use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const PRIMARY_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS question_banks (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            subject TEXT,
            total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
            status TEXT NOT NULL
                CHECK (status IN ('uploading', 'processing', 'completed', 'error')),
            file_type TEXT NOT NULL CHECK (file_type IN ('pdf', 'docx', 'xlsx')),
            file_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            bank_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            correct_answer TEXT NOT NULL,
            explanation TEXT,
            subject TEXT,
            system TEXT,
            difficulty TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard')),
            tags TEXT NOT NULL,
            images TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (bank_id) REFERENCES question_banks(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS question_options (
            question_id INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            option_id TEXT NOT NULL,
            letter TEXT NOT NULL,
            text TEXT NOT NULL,
            PRIMARY KEY (question_id, option_id),
            FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS practice_sessions (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            bank_id INTEGER NOT NULL,
            mode TEXT NOT NULL CHECK (mode IN ('tutor', 'timed', 'review')),
            total_questions INTEGER NOT NULL CHECK (total_questions > 0),
            completed_questions INTEGER NOT NULL
                CHECK (completed_questions >= 0 AND completed_questions <= total_questions),
            correct_answers INTEGER NOT NULL
                CHECK (correct_answers >= 0 AND correct_answers <= completed_questions),
            time_spent INTEGER NOT NULL CHECK (time_spent >= 0),
            status TEXT NOT NULL CHECK (status IN ('active', 'paused', 'completed')),
            started_at TEXT NOT NULL,
            completed_at TEXT,
            metadata TEXT NOT NULL,
            FOREIGN KEY (bank_id) REFERENCES question_banks(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_answers (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            question_id INTEGER NOT NULL,
            session_id INTEGER,
            selected_option TEXT NOT NULL,
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
            time_spent INTEGER NOT NULL CHECK (time_spent >= 0),
            is_flagged INTEGER NOT NULL CHECK (is_flagged IN (0, 1)),
            answered_at TEXT NOT NULL,
            FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
            FOREIGN KEY (session_id) REFERENCES practice_sessions(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_bank_id
            ON questions (bank_id, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_user_answers_user_answered_at
            ON user_answers (user_id, answered_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_practice_sessions_user_started_at
            ON practice_sessions (user_id, started_at);
    ",
];

const DOCUMENTS_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS uploads (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            stored_name TEXT NOT NULL,
            file_size INTEGER NOT NULL CHECK (file_size >= 0),
            mime_type TEXT NOT NULL,
            file_type TEXT NOT NULL,
            status TEXT NOT NULL,
            progress INTEGER NOT NULL CHECK (progress BETWEEN 0 AND 100),
            error TEXT,
            uploaded_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS system_logs (
            id INTEGER PRIMARY KEY,
            level TEXT NOT NULL CHECK (level IN ('debug', 'info', 'warn', 'error')),
            message TEXT NOT NULL,
            service TEXT NOT NULL,
            user_id TEXT,
            session_id INTEGER,
            metadata TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_uploads_user
            ON uploads (user_id, uploaded_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_system_logs_service_created_at
            ON system_logs (service, created_at);
    ",
];

async fn ensure_version_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Apply `statements` as `version` in one transaction unless already recorded.
async fn apply(
    pool: &SqlitePool,
    version: i64,
    statements: &[&str],
) -> Result<(), SqliteInitError> {
    if is_applied(pool, version).await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for statement in statements {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Create the relational schema (banks, questions with options, sessions, answers).
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    ensure_version_table(pool).await?;
    apply(pool, 1, PRIMARY_V1).await
}

/// Create the document-store schema (uploads, system logs).
pub async fn run_document_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    ensure_version_table(pool).await?;
    apply(pool, 1, DOCUMENTS_V1).await
}
