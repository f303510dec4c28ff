use std::{env, fmt, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_DB_URL: &str = "sqlite://qbank.sqlite3?mode=rwc";
pub const DEFAULT_DOCS_DB_URL: &str = "sqlite://qbank-docs.sqlite3?mode=rwc";

/// Local front-end dev servers, always allowed alongside `QBANK_CORS_ORIGIN`.
pub const LOCAL_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:3002",
];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: &'static str },

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub db_url: String,
    pub docs_db_url: String,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub environment: String,
    /// Comma-separated browser origins allowed by CORS.
    pub cors_origin: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("db_url", &self.db_url)
            .field("docs_db_url", &self.docs_db_url)
            .field("jwt_secret", &"<redacted>")
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("environment", &self.environment)
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

impl Config {
    /// Read settings from the environment, after loading `.env` if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `QBANK_JWT_SECRET` is missing or a value
    /// does not parse.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            debug!("No .env file loaded: {err}");
        }

        Ok(Self {
            port: try_load("QBANK_PORT", "3000")?,
            db_url: try_load("QBANK_DB_URL", DEFAULT_DB_URL)?,
            docs_db_url: try_load("QBANK_DOCS_DB_URL", DEFAULT_DOCS_DB_URL)?,
            jwt_secret: require("QBANK_JWT_SECRET")?,
            upload_dir: try_load("QBANK_UPLOAD_DIR", "./uploads")?,
            max_upload_bytes: try_load("QBANK_MAX_UPLOAD_BYTES", "52428800")?,
            environment: try_load("QBANK_ENV", "development")?,
            cors_origin: try_load("QBANK_CORS_ORIGIN", LOCAL_ORIGINS[0])?,
        })
    }

    /// Configured origins followed by the local dev origins, without duplicates.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = Vec::new();
        let configured = self.cors_origin.split(',').map(str::trim);
        for origin in configured.chain(LOCAL_ORIGINS) {
            let origin = origin.trim_end_matches('/');
            if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_owned());
            }
        }
        origins
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    let value = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }
    })
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    var(key).ok_or_else(|| {
        warn!("Environment variable {key} not found");
        ConfigError::Missing { key }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let config = Config {
            port: 3000,
            db_url: DEFAULT_DB_URL.into(),
            docs_db_url: DEFAULT_DOCS_DB_URL.into(),
            jwt_secret: "super-secret".into(),
            upload_dir: "./uploads".into(),
            max_upload_bytes: 1,
            environment: "test".into(),
            cors_origin: LOCAL_ORIGINS[0].into(),
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn allowed_origins_merge_configured_and_local() {
        let config = Config {
            port: 3000,
            db_url: DEFAULT_DB_URL.into(),
            docs_db_url: DEFAULT_DOCS_DB_URL.into(),
            jwt_secret: "s".into(),
            upload_dir: "./uploads".into(),
            max_upload_bytes: 1,
            environment: "production".into(),
            cors_origin: "https://qbank.example.com/, http://localhost:3001".into(),
        };
        assert_eq!(
            config.allowed_origins(),
            vec![
                "https://qbank.example.com",
                "http://localhost:3001",
                "http://localhost:3000",
                "http://localhost:3002",
            ]
        );
    }

    #[test]
    fn unparsable_default_reports_key() {
        let err = try_load::<u16>("QBANK_TEST_UNSET_PORT", "not-a-port").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "QBANK_TEST_UNSET_PORT", .. }));
    }
}
