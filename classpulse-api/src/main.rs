//! classpulse-api - session analytics and live-signal ingestion service
//!
//! Collects anonymous in-class signal feedback from student clients,
//! aggregates it per (class, session) and serves teachers live or
//! post-session analytics over HTTP and SSE.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use classpulse_api::{build_router, AppState};
use classpulse_common::config::{ConfigOverrides, ServiceConfig};

/// Session analytics and live-signal ingestion service
#[derive(Debug, Parser)]
#[command(name = "classpulse-api", version)]
struct Cli {
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the event store database
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Shared secret expected in the X-API-Key header
    #[arg(long)]
    api_key: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting ClassPulse API (classpulse-api) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let cli = Cli::parse();
    let config = ServiceConfig::resolve(ConfigOverrides {
        port: cli.port,
        data_dir: cli.data_dir,
        api_key: cli.api_key,
        config_path: cli.config,
    })?;

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());
    let pool = classpulse_api::db::init_database(&db_path).await?;

    let port = config.port;
    let state = AppState::new(pool, &config);
    let app = build_router(state);

    // Student clients submit from their own devices, so listen beyond
    // loopback
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("classpulse-api listening on http://0.0.0.0:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
