//! Reservation Service - bookings for the StayInn platform
//!
//! Serves available periods and reservations over HTTP, delegating identity
//! and accommodation lookups to sibling services.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::Layered,
    prelude::*,
    EnvFilter, Layer, Registry,
};

use reservation_service::config::{LogFormat, LogTarget, LoggingConfig};
use reservation_service::{create_router, AppConfig, AppState, InMemoryRepository};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("Reservation Service {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must stay alive so buffered log lines reach the file
    let _log_guard = init_logging(&config.logging);

    info!("Reservation service starting up");
    info!(
        profile = %config.services.profile.url,
        accommodation = %config.services.accommodation.url,
        notification = %config.services.notification.url,
        request_timeout_secs = ?config.server.request_timeout_secs,
        "Configuration loaded successfully"
    );

    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(config.clone(), repo)
        .context("Failed to initialize application state")?;

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Reservation service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_help() {
    println!(
        "Reservation Service {}

USAGE:
    reservation-service [OPTIONS]

OPTIONS:
    -h, --help       Print this help
    -V, --version    Print version

ENVIRONMENT:
    RESERVATION_CONFIG                 Path to the YAML configuration file
    RESERVATION_HOST, RESERVATION_PORT Listen address
    RESERVATION_REQUEST_TIMEOUT_SECS   Deadline for every inbound request
    JWT_SECRET                         Token signing secret
    PROFILE_SERVICE_URL                Profile service base URL
    ACCOMMODATION_SERVICE_URL          Accommodation service base URL
    NOTIFICATION_SERVICE_URL           Notification service base URL
    RUST_LOG                           Log filter
    RESERVATION_LOG_FORMAT             pretty | compact | json
    RESERVATION_LOG_TARGET             console | file | both
    RESERVATION_LOG_DIR                Directory for log files",
        env!("CARGO_PKG_VERSION")
    );
}

type LogSubscriber = Layered<EnvFilter, Registry>;
type LogLayer = Box<dyn Layer<LogSubscriber> + Send + Sync>;

/// Install the global subscriber: one formatting layer per configured sink.
/// The returned guard flushes the file sink when dropped.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut sinks: Vec<LogLayer> = Vec::new();
    let mut guard = None;

    if matches!(config.target, LogTarget::Console | LogTarget::Both) {
        sinks.push(format_layer(&config.format, std::io::stdout, true));
    }
    if matches!(config.target, LogTarget::File | LogTarget::Both) {
        let (writer, file_guard) = file_sink(config);
        sinks.push(format_layer(&config.format, writer, false));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry().with(filter).with(sinks).init();
    guard
}

fn format_layer<W>(format: &LogFormat, writer: W, ansi: bool) -> LogLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Json => layer.json().with_target(true).boxed(),
        LogFormat::Compact => layer.compact().with_target(false).boxed(),
        LogFormat::Pretty => layer.with_target(true).boxed(),
    }
}

/// Non-blocking writer under `log_dir`, rotated daily when enabled
fn file_sink(config: &LoggingConfig) -> (NonBlocking, WorkerGuard) {
    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("Warning: cannot create log directory {:?}: {}", config.log_dir, e);
    }

    let appender = if config.daily_rotation {
        tracing_appender::rolling::daily(&config.log_dir, &config.log_prefix)
    } else {
        tracing_appender::rolling::never(&config.log_dir, &config.log_prefix)
    };

    tracing_appender::non_blocking(appender)
}
