//! Error types and handling
//!
//! Every failure a handler can produce ends up as an [`AppError`], which
//! renders as a consistent JSON [`ErrorResponse`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::db::RepositoryError;
use crate::resilience::CallError;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request - undecodable body, failed validation, ownership mismatch (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload failed field validation (400)
    #[error("Validation failed: {0}")]
    Validation(validator::ValidationErrors),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Sibling service failed or answered with a 5xx (502)
    #[error("Upstream error: {0}")]
    BadGateway(String),

    /// Sibling service is behind an open circuit breaker (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Request deadline expired while waiting on a sibling service (504)
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// HTTP status this error renders with
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// Error response body
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Error code for programmatic handling (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
            code: None,
        }
    }

    /// Add details to the error response
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Add an error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (error_type, should_log) = match &self {
            AppError::NotFound(_) => ("not_found", false),
            AppError::BadRequest(_) => ("bad_request", false),
            AppError::Validation(_) => ("bad_request", false),
            AppError::Internal(_) => ("internal_error", true),
            AppError::BadGateway(_) => ("upstream_error", true),
            AppError::ServiceUnavailable(_) => ("service_unavailable", true),
            AppError::GatewayTimeout(_) => ("gateway_timeout", true),
        };

        // Log server errors
        if should_log {
            error!(error = %self, error_type = error_type, "Request error");
        }

        let mut body = ErrorResponse::new(error_type, self.to_string());
        if let AppError::Validation(errors) = &self {
            body = body.with_code("validation_failed");
            if let Ok(fields) = serde_json::to_value(errors.field_errors()) {
                body = body.with_details(fields);
            }
        }

        (self.status(), Json(body)).into_response()
    }
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match &err {
            CallError::BreakerOpen { .. } => AppError::ServiceUnavailable(err.to_string()),
            CallError::Timeout { .. } => AppError::GatewayTimeout(err.to_string()),
            CallError::Remote { status, .. } if status.is_client_error() => {
                AppError::BadRequest(err.to_string())
            }
            CallError::Remote { .. } | CallError::Transport { .. } | CallError::Decode { .. } => {
                AppError::BadGateway(err.to_string())
            }
            CallError::InvalidRequest { .. } => AppError::Internal(err.to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::Conflict(reason) => AppError::BadRequest(reason),
            RepositoryError::Unavailable(reason) => AppError::Internal(reason),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
