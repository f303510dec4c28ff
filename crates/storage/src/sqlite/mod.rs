use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::cache::CachedQuestions;
use crate::repository::{Datastore, Storage, StorageError};

mod answer_repo;
mod bank_repo;
mod log_repo;
mod mapping;
mod migrate;
mod question_repo;
mod session_repo;
mod upload_repo;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

async fn open_pool(database_url: &str) -> Result<SqlitePool, SqliteInitError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON;")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA journal_mode = WAL;")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA busy_timeout = 5000;")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;
    Ok(pool)
}

async fn ping_pool(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| StorageError::Connection(e.to_string()))
}

/// Relational store for banks, questions, sessions and answers.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// enforcing foreign key constraints fails during setup.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Ok(Self {
            pool: open_pool(database_url).await?,
        })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

#[async_trait::async_trait]
impl Datastore for SqliteRepository {
    async fn ping(&self) -> Result<(), StorageError> {
        ping_pool(&self.pool).await
    }
}

/// Document store for upload records and activity logs, kept in its own database.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Ok(Self {
            pool: open_pool(database_url).await?,
        })
    }

    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_document_migrations(&self.pool).await
    }
}

#[async_trait::async_trait]
impl Datastore for SqliteDocumentStore {
    async fn ping(&self) -> Result<(), StorageError> {
        ping_pool(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by two `SQLite` databases.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(primary_url: &str, documents_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(primary_url).await?;
        repo.migrate().await?;
        let docs = SqliteDocumentStore::connect(documents_url).await?;
        docs.migrate().await?;

        let cached = Arc::new(CachedQuestions::new(Arc::new(repo.clone())));
        Ok(Self {
            questions: cached.clone(),
            banks: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            uploads: Arc::new(docs.clone()),
            logs: Arc::new(docs.clone()),
            primary: Arc::new(repo),
            documents: Arc::new(docs),
            cache: cached,
        })
    }
}
