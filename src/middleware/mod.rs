//! Middleware components
//!
//! Per-route chains run in this order:
//! - content type (always)
//! - body decoding (routes with a payload)
//! - authentication and role check (protected routes)
//!
//! The request deadline stage wraps the whole router.

pub mod auth;
pub mod body;
pub mod content_type;
pub mod deadline;
pub mod rbac;

pub use auth::{AuthError, AuthUser, Claims, TokenVerifier};
pub use body::{decode_json, DecodeError, Decoded};
pub use content_type::json_content_type;
pub use deadline::{request_deadline, RequestDeadline};
pub use rbac::{authorize, require_roles, AllowedRoles, RbacError, RoleGate};
