// src/main.rs
use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod clock;
mod config;
mod date_headers;
mod error;
mod handlers;
mod modification_ledger;
mod reconciler;
mod roster;
mod roster_merge;
mod roster_state;
mod schedule_requests;
mod sheet_links;
mod sheet_parser;
mod sheet_source;
mod shift_codes;
mod storage;

#[cfg(test)]
mod roster_state_tests;

use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, Cli};
use crate::handlers::{build_router, AppState};
use crate::roster_state::RosterState;
use crate::sheet_source::HttpSheetSource;
use crate::storage::DataDir;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()
        .context("Failed to read ROSTER_* configuration")?
        .with_cli(cli);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting roster service");

    let credentials = config
        .credentials()
        .context("Invalid ROSTER_ADMIN_USERS")?;
    if credentials.is_empty() {
        warn!("No admin users configured; /admin/api will reject every request");
    }

    // --- State ---
    let data_dir = DataDir::new(&config.data_dir);
    info!("Data directory: {}", data_dir.root().display());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let roster = RosterState::load(data_dir, clock.clone());
    let sheets = HttpSheetSource::new(config.fetch_timeout())
        .context("Failed to build sheet HTTP client")?;
    let state = AppState::new(roster, Arc::new(sheets), credentials, clock);

    let app = build_router(state);

    // --- Serve ---
    match config.tls_paths() {
        Some((cert, key)) => {
            let addr: SocketAddr = config
                .bind_addr
                .parse()
                .with_context(|| format!("Invalid bind address '{}'", config.bind_addr))?;
            let tls_config = RustlsConfig::from_pem_file(cert, key)
                .await
                .context("Failed to load TLS cert/key")?;
            info!(
                "TLS configuration loaded from {} and {}",
                cert.display(),
                key.display()
            );
            info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("Server error")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(&config.bind_addr)
                .await
                .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
            info!("Listening on http://{}", config.bind_addr);
            axum::serve(listener, app).await.context("Server error")?;
        }
    }

    Ok(())
}
