//! HTTP surface.
//!
//! API endpoints:
//! - POST   /api/voice/enroll   - Enroll from 3-5 audio samples (multipart)
//! - POST   /api/voice/verify   - Verify one audio sample (multipart)
//! - GET    /api/voice/status   - Enrollment status
//! - DELETE /api/voice/enroll   - Remove enrollment
//! - GET    /api/voice/history  - Recent attempts
//! - GET    /api/voice/health   - Embedding service health (no auth)

pub mod auth;
pub mod handlers;
pub mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::adapters::HttpEmbeddingClient;
use crate::config::ResolvedConfig;
use crate::core::VoiceOrchestrator;
use crate::storage::SqliteStore;

pub use auth::{AuthenticatedUser, USER_ID_HEADER};
pub use response::ApiError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<VoiceOrchestrator>,
    pub api_token: Option<Arc<str>>,
    pub embedding_url: Arc<str>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<VoiceOrchestrator>,
        api_token: Option<String>,
        embedding_url: impl Into<String>,
    ) -> Self {
        let embedding_url: String = embedding_url.into();
        Self {
            orchestrator,
            api_token: api_token.map(Arc::from),
            embedding_url: Arc::from(embedding_url),
        }
    }
}

/// Wire the HTTP embedding client and SQLite store from config
pub fn build_orchestrator(config: &ResolvedConfig) -> Result<VoiceOrchestrator> {
    let backend = HttpEmbeddingClient::new(config.embedding.clone());
    let store = SqliteStore::open(&config.database).with_context(|| {
        format!("Failed to open voice database: {}", config.database.display())
    })?;

    Ok(VoiceOrchestrator::new(
        Arc::new(backend),
        Arc::new(store),
        config.voice.clone(),
    ))
}

/// Build the router
pub fn router(state: AppState, max_request_bytes: usize) -> Router {
    Router::new()
        .route(
            "/api/voice/enroll",
            post(handlers::enroll).delete(handlers::remove),
        )
        .route("/api/voice/verify", post(handlers::verify))
        .route("/api/voice/status", get(handlers::status))
        .route("/api/voice/history", get(handlers::history))
        .route("/api/voice/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .with_state(state)
}

/// Parse address string to SocketAddr (":8080" binds all interfaces)
fn parse_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    addr.parse()
        .with_context(|| format!("Invalid bind address: {}", addr))
}

/// Run the HTTP server until Ctrl-C
pub async fn serve(config: &ResolvedConfig, bind_override: Option<&str>) -> Result<()> {
    let orchestrator = Arc::new(build_orchestrator(config)?);
    let state = AppState::new(
        orchestrator,
        config.api_token.clone(),
        config.embedding.base_url.clone(),
    );
    let app = router(state, config.max_request_bytes());

    let addr = parse_addr(bind_override.unwrap_or(&config.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        %addr,
        embedding_url = %config.embedding.base_url,
        database = %config.database.display(),
        auth = config.api_token.is_some(),
        "voxguard listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("voxguard stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
