//! Bearer-token authentication for the API routes.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use qbank_core::model::UserId;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: usize,
}

/// Verifies HS256 tokens signed with the auth provider's shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for a bad signature, an expired token
    /// or a blank subject.
    pub fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            tracing::debug!(error = %err, "rejected bearer token");
            ApiError::Unauthorized
        })?;
        UserId::new(data.claims.sub).map_err(|_| ApiError::Unauthorized)
    }
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized)?;
        state.jwt.verify(bearer.token()).map(CurrentUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, sub: &str, exp: usize) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: sub.into(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    const FAR_FUTURE: usize = 4_102_444_800;

    #[test]
    fn accepts_valid_token() {
        let verifier = JwtVerifier::new("secret");
        let user = verifier.verify(&token("secret", "user-42", FAR_FUTURE)).unwrap();
        assert_eq!(user.as_str(), "user-42");
    }

    #[test]
    fn rejects_wrong_secret_expired_and_blank_subject() {
        let verifier = JwtVerifier::new("secret");
        assert!(matches!(
            verifier.verify(&token("other", "user-42", FAR_FUTURE)),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            verifier.verify(&token("secret", "user-42", 1_000)),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            verifier.verify(&token("secret", "  ", FAR_FUTURE)),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(verifier.verify("not-a-jwt"), Err(ApiError::Unauthorized)));
    }
}
