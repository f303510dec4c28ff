use services::AppServices;

use crate::auth::JwtVerifier;

/// Shared handles every handler receives.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub jwt: JwtVerifier,
    pub max_upload_bytes: u64,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices, jwt_secret: &str, max_upload_bytes: u64) -> Self {
        Self {
            services,
            jwt: JwtVerifier::new(jwt_secret),
            max_upload_bytes,
        }
    }
}
