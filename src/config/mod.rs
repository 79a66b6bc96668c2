//! Configuration management
//!
//! YAML-based configuration with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings
//! - Per-service circuit breaker thresholds

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub services: ServicesConfig,
    /// Breaker thresholds used by every service without its own `breaker` block
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deadline applied to every inbound request, inherited by outbound calls
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: None,
        }
    }
}

/// Token verification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HMAC secret shared with the service that issues tokens
    pub jwt_secret: String,
}

/// Base addresses of the sibling services
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    pub profile: ServiceConfig,
    pub accommodation: ServiceConfig,
    pub notification: ServiceConfig,
}

/// Connection settings for one sibling service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Overrides the top-level breaker settings for this service
    #[serde(default)]
    pub breaker: Option<BreakerConfig>,
}

impl ServiceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_secs: default_connect_timeout(),
            breaker: None,
        }
    }

    /// Breaker settings for this service, falling back to `default`
    pub fn effective_breaker<'a>(&'a self, default: &'a BreakerConfig) -> &'a BreakerConfig {
        self.breaker.as_ref().unwrap_or(default)
    }
}

fn default_connect_timeout() -> u64 {
    5
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout() -> u64 {
    60
}

fn default_half_open_max_calls() -> u32 {
    1
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default)]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file" or "both")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/stayinn/reservation")
}

fn default_log_prefix() -> String {
    "reservation-service".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig {
                jwt_secret: "change-me-in-production-minimum-32-characters-long".to_string(),
            },
            services: ServicesConfig {
                profile: ServiceConfig::new("http://profile-service:8080"),
                accommodation: ServiceConfig::new("http://accommodation-service:8080"),
                notification: ServiceConfig::new("http://notification-service:8080"),
            },
            breaker: BreakerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("RESERVATION_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                Self::from_file(path)?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    /// Parse a YAML configuration file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/reservation-service/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("reservation-service/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("RESERVATION_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("RESERVATION_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(timeout) = std::env::var("RESERVATION_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.server.request_timeout_secs = Some(secs);
            }
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Ok(url) = std::env::var("PROFILE_SERVICE_URL") {
            self.services.profile.url = url;
        }
        if let Ok(url) = std::env::var("ACCOMMODATION_SERVICE_URL") {
            self.services.accommodation.url = url;
        }
        if let Ok(url) = std::env::var("NOTIFICATION_SERVICE_URL") {
            self.services.notification.url = url;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("RESERVATION_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        if let Ok(target) = std::env::var("RESERVATION_LOG_TARGET") {
            self.logging.target = match target.to_lowercase().as_str() {
                "file" => LogTarget::File,
                "both" => LogTarget::Both,
                _ => LogTarget::Console,
            };
        }
        if let Ok(dir) = std::env::var("RESERVATION_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }
    }

    fn normalize(&mut self) {
        for service in [
            &mut self.services.profile,
            &mut self.services.accommodation,
            &mut self.services.notification,
        ] {
            service.url = service.url.trim_end_matches('/').to_string();
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!("JWT secret cannot be empty");
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!("JWT secret is shorter than 32 characters");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.server.request_timeout_secs == Some(0) {
            anyhow::bail!("Request timeout must be greater than 0 when set");
        }

        for (name, service) in [
            ("profile", &self.services.profile),
            ("accommodation", &self.services.accommodation),
            ("notification", &self.services.notification),
        ] {
            if !(service.url.starts_with("http://") || service.url.starts_with("https://")) {
                anyhow::bail!("Invalid {} service URL: {}", name, service.url);
            }
            Self::validate_breaker(name, service.effective_breaker(&self.breaker))?;
        }

        Ok(())
    }

    fn validate_breaker(name: &str, breaker: &BreakerConfig) -> Result<()> {
        if breaker.failure_threshold == 0 {
            anyhow::bail!("Breaker failure_threshold for {} must be at least 1", name);
        }
        if breaker.half_open_max_calls == 0 {
            anyhow::bail!("Breaker half_open_max_calls for {} must be at least 1", name);
        }
        if breaker.reset_timeout_secs == 0 {
            anyhow::bail!("Breaker reset_timeout_secs for {} must be at least 1", name);
        }
        Ok(())
    }
}
