//! Request body decoding stage
//!
//! `decode_json::<T>` reads the body, decodes it as `T` and attaches it to the
//! request as [`Decoded<T>`]. A body that does not decode ends the request with
//! a 400 before any later stage runs. Decoding is structural only; business
//! validation is the handler's job.

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::utils::error::{AppError, ErrorResponse};

/// Upper bound on request bodies accepted by the decode stage
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Payload decoded by [`decode_json`], one extension slot per payload type
#[derive(Debug, Clone)]
pub struct Decoded<T>(pub T);

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unable to read request body: {0}")]
    Body(String),
    #[error("Unable to decode json: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntoResponse for DecodeError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new("bad_request", self.to_string());
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Decode `bytes` as `T`
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Body decoding middleware for payload type `T`
pub async fn decode_json<T>(request: Request, next: Next) -> Response
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let (mut parts, body) = request.into_parts();

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return DecodeError::Body(e.to_string()).into_response(),
    };

    let payload = match decode_payload::<T>(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(
                path = %parts.uri.path(),
                payload = std::any::type_name::<T>(),
                error = %e,
                "Rejected undecodable body"
            );
            return e.into_response();
        }
    };

    parts.extensions.insert(Decoded(payload));
    next.run(Request::from_parts(parts, Body::empty())).await
}

impl<S, T> FromRequestParts<S> for Decoded<T>
where
    S: Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.remove::<Decoded<T>>().ok_or_else(|| {
            AppError::internal(format!(
                "route is missing the decode stage for {}",
                std::any::type_name::<T>()
            ))
        })
    }
}
