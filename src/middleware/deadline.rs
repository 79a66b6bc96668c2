//! Request deadline stage
//!
//! Stamps every inbound request with a [`CallContext`]. When a request timeout
//! is configured, the rest of the chain runs under that deadline and outbound
//! calls inherit it; a request still running at the deadline is dropped and
//! answered with 504.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::{timeout_at, Instant};
use tracing::warn;

use crate::resilience::CallContext;
use crate::utils::error::AppError;

/// State for [`request_deadline`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestDeadline {
    timeout: Option<Duration>,
}

impl RequestDeadline {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

pub async fn request_deadline(
    State(deadline): State<RequestDeadline>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(timeout) = deadline.timeout else {
        request.extensions_mut().insert(CallContext::background());
        return next.run(request).await;
    };

    let at = Instant::now() + timeout;
    request.extensions_mut().insert(CallContext::with_deadline(at));

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match timeout_at(at, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%method, %path, timeout_ms = timeout.as_millis() as u64, "Request deadline exceeded");
            AppError::GatewayTimeout(format!("{} {} exceeded its deadline", method, path))
                .into_response()
        }
    }
}

/// The request's deadline, or none when the deadline stage is not installed
impl<S> FromRequestParts<S> for CallContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CallContext>()
            .copied()
            .unwrap_or_default())
    }
}
