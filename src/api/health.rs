//! Health check endpoints
//!
//! Provides health check endpoints for monitoring and load balancers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::resilience::{BreakerMode, BreakerStatus};
use crate::AppState;

/// Basic health response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Detailed health response with one entry per downstream breaker
#[derive(Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub version: String,
    pub downstreams: Vec<BreakerStatus>,
}

/// Simple health check endpoint (for load balancers)
///
/// Returns 200 OK if the service is running.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Detailed health check endpoint
///
/// Returns 200 while every breaker is closed, 503 otherwise.
pub async fn health_check_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<DetailedHealthResponse>) {
    let downstreams: Vec<BreakerStatus> = state
        .downstreams
        .breakers()
        .iter()
        .map(|b| b.status())
        .collect();

    let (status_code, response) = summarize(downstreams);
    (status_code, Json(response))
}

fn summarize(downstreams: Vec<BreakerStatus>) -> (StatusCode, DetailedHealthResponse) {
    let healthy = downstreams.iter().all(|s| s.mode == BreakerMode::Closed);

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = DetailedHealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        downstreams,
    };

    (status_code, response)
}
