//! # Search API Server
//!
//! The HTTP entry point of the es-search service.
//!
//! ## Startup sequence:
//! 1. Loads `.env` (if any) and parses the command line.
//! 2. Loads settings, from `config.json` (fixed search order) or from the
//!    built-in fixture when `RUNNING_MODE=test`.
//! 3. Installs the global logger described by the `logger` section.
//! 4. Builds the search client, the Redis cache and the MySQL pool.
//! 5. Serves the API on `common.host:common.port` until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use search_common::Logger;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::Level;

mod search_logic;
use search_logic::{config::AppConfig, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment and command line
    let _ = dotenvy::dotenv();
    let app_config = AppConfig::parse();

    // 2. Settings
    let settings = app_config
        .load_settings()
        .context("failed to load settings")?;

    // 3. Logging
    let logger = Logger::new(&settings.logger()).context("failed to build logger")?;
    logger.install_global().context("failed to install logger")?;
    logger.log_kv(
        Level::INFO,
        "settings loaded",
        &[
            ("mode", &settings.common.mode),
            ("app_name", &settings.common.sys_name),
            ("version", &settings.common.version),
        ],
    );
    tracing::debug!("effective settings: {}", settings);

    // 4. Backends
    let settings = Arc::new(settings);
    let state = AppState::build(Arc::clone(&settings)).await?;
    logger.log(
        Level::INFO,
        format_args!("search nodes: {:?}", state.search.nodes().iter().map(|u| u.as_str()).collect::<Vec<_>>()),
    );

    // 5. Serve
    let addr = AppConfig::bind_addr(&settings);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    logger.log(
        Level::INFO,
        format_args!("es-search listening on http://{}", listener.local_addr()?),
    );

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    logger.log(Level::INFO, format_args!("server stopped"));
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = terminate() => {
            tracing::info!("SIGTERM received, initiating shutdown.");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut term_signal) => {
            term_signal.recv().await;
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    // On non-unix platforms, just wait forever.
    std::future::pending::<()>().await;
}
