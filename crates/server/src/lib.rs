//! HTTP front end for the question-bank practice service.
//!
//! Every route except `/api/health` expects `Authorization: Bearer <jwt>`.
//! Errors share the `{ "success": false, "error": "..." }` envelope.

use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{
            AUTHORIZATION, CONTENT_SECURITY_POLICY, CONTENT_TYPE, REFERRER_POLICY,
            STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
};
use services::{AppServices, AppServicesError, Clock, ServiceSettings};
use thiserror::Error;
use tokio::{net::TcpListener, signal};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

use config::Config;
use state::AppState;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    #[error(transparent)]
    Services(#[from] AppServicesError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Install the console subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Build the full application router over `state`.
///
/// Browsers may only call the API from `allowed_origins`; requests without an
/// `Origin` header are unaffected.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin:?}");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = routes::api_router(state.max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors);
    security_headers(app).with_state(state)
}

/// Headers attached to every response unless a handler already set them.
const SECURITY_HEADERS: [(HeaderName, &str); 5] = [
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (X_FRAME_OPTIONS, "DENY"),
    (REFERRER_POLICY, "no-referrer"),
    (
        STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains; preload",
    ),
    (
        CONTENT_SECURITY_POLICY,
        "default-src 'self'; frame-src 'none'; object-src 'none'",
    ),
];

fn security_headers(mut app: Router<AppState>) -> Router<AppState> {
    for (name, value) in SECURITY_HEADERS {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ));
    }
    app
}

/// Open storage, bind `config.port` and serve until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns `ServerError` if storage cannot be opened or the port cannot be
/// bound.
pub async fn start_server(config: Config) -> Result<(), ServerError> {
    info!("Initializing services...");
    let services = AppServices::new_sqlite(
        &config.db_url,
        &config.docs_db_url,
        ServiceSettings {
            clock: Clock::default(),
            environment: config.environment.clone(),
            upload_dir: config.upload_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        },
    )
    .await?;
    let state = AppState::new(services, &config.jwt_secret, config.max_upload_bytes);
    let allowed_origins = config.allowed_origins();
    info!("CORS origins: {}", allowed_origins.join(", "));

    info!("Starting server...");
    let app = router(state, &allowed_origins);

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                error!("Failed to install Ctrl+C handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!("Failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
