//! JWT verification
//!
//! Tokens are HS256-signed by the platform's auth service and carry the
//! caller's `username` and `role`. [`TokenVerifier`] is the only producer of
//! [`Claims`].

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::utils::error::ErrorResponse;

/// Verified identity of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    pub role: String,
    /// Expiration timestamp (seconds since the epoch)
    pub expires_at: i64,
    /// Issued at timestamp, when the issuer set one
    pub issued_at: Option<i64>,
}

/// Claims as they appear in the token, before any checks
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
}

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid authentication token")]
    InvalidToken,
    #[error("Authentication token has expired")]
    TokenExpired,
    #[error("Authentication token lacks username or role")]
    MissingClaims,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new("unauthorized", self.to_string());
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Verifies tokens against the shared signing secret
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `verify_at`
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token against the current time
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as of `now` (seconds since the epoch)
    ///
    /// A token is accepted while `now < exp`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }

        let raw = decode::<RawClaims>(token, &self.key, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?
            .claims;

        let expires_at = raw.exp.ok_or(AuthError::InvalidToken)?;
        if now >= expires_at {
            return Err(AuthError::TokenExpired);
        }

        let username = raw.username.filter(|u| !u.is_empty());
        let role = raw.role.filter(|r| !r.is_empty());
        match (username, role) {
            (Some(username), Some(role)) => Ok(Claims {
                username,
                role,
                expires_at,
                issued_at: raw.iat,
            }),
            _ => Err(AuthError::MissingClaims),
        }
    }
}

/// Authenticated caller, attached to the request by the role gate
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: String,
    /// Raw bearer token, forwarded on calls made for this user
    pub token: String,
}

impl AuthUser {
    pub fn new(claims: Claims, token: impl Into<String>) -> Self {
        Self {
            username: claims.username,
            role: claims.role,
            token: token.into(),
        }
    }
}

/// Extractor for AuthUser from request extensions
///
/// Only usable on routes behind [`crate::middleware::require_roles`].
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("unauthorized", "Authentication required")),
            )
        })
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Bearer token from the request headers, if any
pub fn bearer_from_headers(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;
    extract_bearer_token(header).ok_or(AuthError::InvalidToken)
}
