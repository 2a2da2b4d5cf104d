//! # Audio Convert Backend - Main Application Entry Point
//!
//! An Actix-web HTTP service that takes a video URL, pulls its audio-only
//! stream from the video platform, re-encodes it to MP3, and returns the file.
//!
//! ## Application Architecture:
//! - **config**: Layered configuration (defaults, config.toml, environment)
//! - **error**: Error types and their HTTP responses
//! - **state**: Shared state: configuration, conversion pipeline, metrics
//! - **media**: The conversion pipeline and its external collaborators
//! - **handlers**: Route registration and the conversion/status endpoints
//! - **health**: Health and metrics endpoints
//! - **middleware**: Per-endpoint request metrics

mod config;
mod error;
mod handlers;
mod health;
mod media;
mod middleware;
mod state;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use config::AppConfig;
use state::AppState;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** through `tracing`
/// 3. **Builds the shared state**, including the conversion pipeline
/// 4. **Starts the HTTP server** with middleware and routes
/// 5. **Stops gracefully** on SIGINT or SIGTERM
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    info!("Starting audio-convert-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        auth_mode = %config.auth.mode,
        "Configuration loaded"
    );

    let scratch_dir = config.conversion.scratch_dir();
    if !scratch_dir.is_dir() {
        warn!(
            path = %scratch_dir.display(),
            "Scratch directory does not exist; conversions will fail"
        );
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::from_config(config);

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::MetricsMiddleware)
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .disable_signals()
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "audio_convert_backend=trace")
/// - If not set, defaults to "audio_convert_backend=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_convert_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("failed to initialize tracing")?;

    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
///
/// If a handler cannot be installed the error is logged and that signal is
/// ignored; the other one still stops the server.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let wait_for = |kind: SignalKind, name: &'static str| async move {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received {}", name);
            }
            Err(e) => {
                error!("Failed to install {} handler: {}", name, e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = wait_for(SignalKind::terminate(), "SIGTERM") => {}
        _ = wait_for(SignalKind::interrupt(), "SIGINT") => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
