//! HTTP surface: the single-page UI, the JSON API and the progress stream.
//!
//! Routes:
//! - `GET  /`                      - HTML page
//! - `GET  /health`                - liveness probe
//! - `POST /formats`               - quality options for a URL
//! - `POST /download`              - start a background download
//! - `GET  /progress/{session_id}` - SSE progress stream
//! - `POST /info`                  - probed metadata for a URL

pub mod handlers;
pub mod stream;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

use crate::core::config::WebConfig;
use crate::download::extractor::MediaExtractor;
use crate::download::runner::{DownloadRunner, RunnerLimits};
use crate::storage::sessions::SessionStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub extractor: Arc<dyn MediaExtractor>,
    pub runner: DownloadRunner,
    /// How long a progress stream waits for the next record
    pub idle_timeout: Duration,
}

impl AppState {
    pub fn new(config: &WebConfig, extractor: Arc<dyn MediaExtractor>) -> Self {
        let sessions = SessionStore::new();
        let runner = DownloadRunner::new(
            Arc::clone(&extractor),
            sessions.clone(),
            config.output_dir.clone(),
            RunnerLimits {
                max_concurrent: config.max_concurrent_downloads,
                max_queued: config.max_queued_downloads,
            },
        );
        Self {
            sessions,
            extractor,
            runner,
            idle_timeout: config.idle_timeout,
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/formats", post(handlers::formats))
        .route("/download", post(handlers::download))
        .route("/progress/{session_id}", get(stream::progress))
        .route("/info", post(handlers::info))
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Starts the web front-end and serves until Ctrl+C.
pub async fn start_web_server(config: WebConfig, extractor: Arc<dyn MediaExtractor>) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("creating download folder {}", config.output_dir.display()))?;

    let state = AppState::new(&config, extractor);
    let reaper = state.sessions.spawn_reaper(config.reap_interval, config.session_ttl);
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding to {}", config.bind_addr))?;

    log::info!("Starting web server on http://{}", config.bind_addr);
    log::info!("  /                       - Download page");
    log::info!("  /formats                - Available qualities (POST)");
    log::info!("  /download               - Start download (POST)");
    log::info!("  /progress/{{session_id}}  - Progress stream (SSE)");
    log::info!("  /info                   - Video info (POST)");
    log::info!("  /health                 - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running web server")?;

    reaper.abort();
    log::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        log::error!("Failed to install Ctrl+C handler: {}", err);
        std::future::pending::<()>().await;
    }
    log::info!("Received Ctrl+C, shutting down");
}
