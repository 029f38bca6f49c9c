//! catscan-api - Cat health scan microservice
//!
//! Accepts cat photos, runs them through the recognition service, stores
//! session artifacts and findings, and serves aggregated health reports.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catscan_api::config::{CliOverrides, ServiceConfig, ServiceToml};
use catscan_api::services::{HttpArtifactStore, HttpRecognitionGateway};
use catscan_api::AppState;
use catscan_common::config::LoggingConfig;

/// Command-line arguments for catscan-api
#[derive(Parser, Debug)]
#[command(name = "catscan-api")]
#[command(about = "Cat health scan microservice")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/catscan/config.toml)
    #[arg(short, long, env = "CATSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Recognition service base URL
    #[arg(long)]
    recognition_url: Option<String>,

    /// Artifact store base URL
    #[arg(long)]
    artifact_store_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(catscan_common::config::default_config_path);
    let toml: ServiceToml = catscan_common::config::load_toml_or_default(config_path.as_deref());

    let cli = CliOverrides {
        root_folder: args.root_folder,
        host: args.host,
        port: args.port,
        recognition_url: args.recognition_url,
        artifact_store_url: args.artifact_store_url,
        log_level: args.log_level,
    };
    let config = ServiceConfig::resolve(cli, toml);

    init_tracing(&config.logging)?;

    info!(
        "Starting catscan-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let initializer = catscan_common::config::RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = catscan_api::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let gateway = HttpRecognitionGateway::new(config.recognition.clone())
        .context("Failed to build recognition client")?;
    info!(
        base_url = %config.recognition.base_url,
        recognize_timeout = ?config.recognition.recognize_timeout,
        remove_bg_timeout = ?config.recognition.remove_bg_timeout,
        retries = config.recognition.recognize_retries,
        "Recognition service configured"
    );

    let store = HttpArtifactStore::new(config.artifact_store_url.clone(), config.artifact_timeout)
        .context("Failed to build artifact store client")?;
    info!(
        base_url = %config.artifact_store_url,
        bucket = %config.artifact_bucket,
        "Artifact store configured"
    );

    let bind_address = config.bind_address();
    let state = AppState::new(db_pool, config, Arc::new(gateway), Arc::new(store));
    let app = catscan_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Console logging, plus a file writer when configured
///
/// `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("catscan_api={level},catscan_common={level},tower_http={level}", level = logging.level).into()
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
