//! Reservation Service Library
//!
//! Reservation microservice of the StayInn platform: available periods and
//! guest reservations, guarded by token-based role checks, with breaker
//! protected calls to the profile, accommodation and notification services.

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware::from_fn_with_state, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod resilience;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::{InMemoryRepository, ReservationRepository};
pub use middleware::{AuthUser, Claims, TokenVerifier};
use middleware::{request_deadline, RequestDeadline};
use services::Downstreams;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Token verifier holding the signing secret
    pub verifier: Arc<TokenVerifier>,
    /// Period and reservation store
    pub repo: Arc<dyn ReservationRepository>,
    /// Clients for sibling services
    pub downstreams: Downstreams,
}

impl AppState {
    pub fn new(config: AppConfig, repo: Arc<dyn ReservationRepository>) -> anyhow::Result<Self> {
        let downstreams = Downstreams::from_config(&config.services, &config.breaker)?;
        Ok(Self {
            verifier: Arc::new(TokenVerifier::new(&config.auth.jwt_secret)),
            config: Arc::new(config),
            repo,
            downstreams,
        })
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Configure tracing for HTTP requests
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let deadline = RequestDeadline::new(
        state
            .config
            .server
            .request_timeout_secs
            .map(Duration::from_secs),
    );

    api::routes(&state)
        .layer(from_fn_with_state(deadline, request_deadline))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
