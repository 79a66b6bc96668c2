//! Role-based route gating
//!
//! Each protected route names the roles it admits. The gate verifies the
//! bearer token, checks the role, and attaches an [`AuthUser`] for the handler.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use super::auth::{bearer_from_headers, AuthUser, Claims, TokenVerifier};
use crate::utils::error::ErrorResponse;

/// Roles a route admits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedRoles {
    /// Any authenticated caller
    Any,
    Only(BTreeSet<String>),
}

impl AllowedRoles {
    pub fn only<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowedRoles::Only(roles.into_iter().map(Into::into).collect())
    }

    pub fn admits(&self, role: &str) -> bool {
        match self {
            AllowedRoles::Any => true,
            AllowedRoles::Only(roles) => roles.contains(role),
        }
    }
}

/// RBAC error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RbacError {
    /// User is not authenticated
    NotAuthenticated,
    /// Role is not admitted by the route
    PermissionDenied { role: String },
}

impl IntoResponse for RbacError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            RbacError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required".to_string(),
            ),
            RbacError::PermissionDenied { role } => (
                StatusCode::FORBIDDEN,
                "forbidden",
                format!("Permission denied for role {}", role),
            ),
        };

        (status, Json(ErrorResponse::new(error_type, message))).into_response()
    }
}

/// Decide whether `claims` may use a route admitting `allowed`
pub fn authorize(claims: Option<&Claims>, allowed: &AllowedRoles) -> Result<(), RbacError> {
    let claims = claims.ok_or(RbacError::NotAuthenticated)?;
    if allowed.admits(&claims.role) {
        Ok(())
    } else {
        Err(RbacError::PermissionDenied {
            role: claims.role.clone(),
        })
    }
}

/// State for [`require_roles`]
#[derive(Debug, Clone)]
pub struct RoleGate {
    verifier: Arc<TokenVerifier>,
    allowed: Arc<AllowedRoles>,
}

impl RoleGate {
    pub fn new(verifier: Arc<TokenVerifier>, allowed: AllowedRoles) -> Self {
        Self {
            verifier,
            allowed: Arc::new(allowed),
        }
    }

    /// Authenticate and authorize the request headers
    pub fn check(&self, request: &Request) -> Result<AuthUser, Response> {
        let token = bearer_from_headers(request.headers()).map_err(IntoResponse::into_response)?;
        let claims = self
            .verifier
            .verify(token)
            .map_err(|e| {
                debug!(error = %e, "Rejected bearer token");
                e.into_response()
            })?;

        authorize(Some(&claims), &self.allowed).map_err(|e| {
            debug!(username = %claims.username, role = %claims.role, "Role not admitted");
            e.into_response()
        })?;

        Ok(AuthUser::new(claims, token))
    }
}

/// Authentication and authorization middleware
///
/// On success the [`AuthUser`] is inserted into request extensions.
pub async fn require_roles(
    State(gate): State<RoleGate>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.check(&request) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(response) => response,
    }
}
