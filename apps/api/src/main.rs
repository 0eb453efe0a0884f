mod config;
mod detection;
mod errors;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::detection::engine::DetectionEngine;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FieldSense API v{}", env!("CARGO_PKG_VERSION"));

    // Registry, override table and tuning are validated here; a bad table never serves a scan.
    let engine = DetectionEngine::load(
        config.site_overrides_path.as_deref(),
        config.scoring_weights_path.as_deref(),
    )
    .context("Failed to initialize the detection engine")?;

    let state = AppState::new(
        Arc::new(engine),
        config.scan_cooldown,
        config.max_scan_sessions,
    );
    info!(
        "Scan cooldown {}ms, at most {} sessions",
        config.scan_cooldown.as_millis(),
        config.max_scan_sessions
    );

    // Content scripts call in from arbitrary page origins.
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
