//! Clients for sibling services
//!
//! Each downstream gets its own HTTP client and circuit breaker, created once
//! at startup and shared by every request.

pub mod accommodation;
pub mod notification;
pub mod profile;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use crate::config::{BreakerConfig, ServiceConfig, ServicesConfig};
use crate::resilience::{BreakerSettings, CircuitBreaker, ResilientClient};

pub use accommodation::AccommodationClient;
pub use notification::NotificationClient;
pub use profile::ProfileClient;

/// Build the breaker-guarded client for one service
pub fn build_client(
    name: &str,
    config: &ServiceConfig,
    default_breaker: &BreakerConfig,
) -> Result<ResilientClient> {
    let breaker_config = config.effective_breaker(default_breaker);
    info!(
        service = name,
        url = %config.url,
        failure_threshold = breaker_config.failure_threshold,
        reset_timeout_secs = breaker_config.reset_timeout_secs,
        "Initializing downstream client"
    );

    let http = Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
        .with_context(|| format!("Failed to create HTTP client for {}", name))?;

    let breaker = Arc::new(CircuitBreaker::new(
        name,
        BreakerSettings::from(breaker_config),
    ));

    Ok(ResilientClient::new(http, config.url.clone(), breaker))
}

/// All sibling-service clients
#[derive(Clone)]
pub struct Downstreams {
    pub profile: ProfileClient,
    pub accommodation: AccommodationClient,
    pub notification: NotificationClient,
}

impl Downstreams {
    pub fn from_config(services: &ServicesConfig, breaker: &BreakerConfig) -> Result<Self> {
        Ok(Self {
            profile: ProfileClient::new(build_client("profile", &services.profile, breaker)?),
            accommodation: AccommodationClient::new(build_client(
                "accommodation",
                &services.accommodation,
                breaker,
            )?),
            notification: NotificationClient::new(build_client(
                "notification",
                &services.notification,
                breaker,
            )?),
        })
    }

    /// Breakers in a stable order, for health reporting
    pub fn breakers(&self) -> [&Arc<CircuitBreaker>; 3] {
        [
            self.profile.client().breaker(),
            self.accommodation.client().breaker(),
            self.notification.client().breaker(),
        ]
    }
}
