use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::ErrorDetail,
};

/// Token lifetime: 24 hours.
pub const ACCESS_TOKEN_EXPIRE_MINUTES: u64 = 1440;

/// Claims
///
/// Payload structure signed into every JWT issued by the login endpoint and
/// validated on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user (`users.id`).
    pub sub: Uuid,
    /// The username the token was issued for, carried so authenticated
    /// handlers never need a credential lookup.
    pub username: String,
    /// Expiration Time (exp): timestamp after which the JWT must be rejected.
    pub exp: usize,
    /// Issued At (iat): timestamp when the JWT was issued.
    pub iat: usize,
}

/// AuthError
///
/// Rejection type for the `AuthUser` extractor. Expired tokens and otherwise
/// invalid tokens produce distinct response details; everything else stays
/// generic.
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("Could not validate credentials")]
    MissingCredentials,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Invalid token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorDetail::new(self.to_string())),
        )
            .into_response()
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the output of the
/// extractor below, consumed by every protected handler.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// create_access_token
///
/// Issues a signed, time-limited token embedding the user id and username.
pub fn create_access_token(
    user_id: Uuid,
    username: &str,
    config: &AppConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        iat: now as usize,
        exp: (now + ACCESS_TOKEN_EXPIRE_MINUTES * 60) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// hash_password
///
/// Salted bcrypt hash for storage in `user_auths.password`.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

/// verify_password
///
/// Constant-time verification of a plaintext password against a stored hash.
/// Hash-format errors are treated as a mismatch rather than surfaced.
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    bcrypt::verify(plain, hashed).unwrap_or(false)
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any authenticated handler. This cleanly separates
/// authentication (extractor) from business logic (the handler).
///
/// The process:
/// 1. Local Bypass: in `Env::Local`, a request may authenticate with the
///    'x-user-id' header to accelerate development.
/// 2. Token Extraction: standard Bearer token from the Authorization header.
/// 3. Validation: HS256 decode with expiry checking; expired and malformed
///    tokens are rejected with distinct details.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        // Local Development Bypass Check. Guarded by the Env check so it can
        // never activate in Production.
        if config.env == Env::Local {
            if let Some(user_id_header) = parts.headers.get("x-user-id") {
                if let Ok(id_str) = user_id_header.to_str() {
                    if let Ok(user_id) = Uuid::parse_str(id_str) {
                        return Ok(AuthUser {
                            id: user_id,
                            username: "local-dev".to_string(),
                        });
                    }
                }
            }
        }

        // Token Extraction: Authorization header prefixed with "Bearer ".
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingCredentials)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingCredentials)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data =
            decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
                // The most common failure for a valid-but-old token.
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                // Bad signature, malformed token, wrong algorithm, etc.
                _ => AuthError::InvalidToken,
            })?;

        Ok(AuthUser {
            id: token_data.claims.sub,
            username: token_data.claims.username,
        })
    }
}
