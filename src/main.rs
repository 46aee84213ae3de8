use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod config;
mod error;
mod handlers;
mod llm;
mod state;
mod utils;

use config::CONFIG;
use llm::GeminiClient;
use state::AppState;
use utils::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guards = init_logging();

    if CONFIG.gemini_api_key.trim().is_empty() {
        warn!("GEMINI_API_KEY is empty; generation requests will fail at the provider");
    }

    let state = AppState::new(Arc::new(GeminiClient::from_config()));

    let app = Router::new()
        .route("/", get(handlers::pages::index))
        .route("/health", get(handlers::pages::health))
        .route("/api/generate", post(handlers::generate::generate_handler))
        .layer(DefaultBodyLimit::max(CONFIG.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listen_addr = format!("{}:{}", CONFIG.host, CONFIG.port);
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    info!("Starting MaSnap portrait server on http://{listen_addr}");
    info!("Endpoints:");
    info!("  GET  /");
    info!("  GET  /health");
    info!("  POST /api/generate");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
    }
}
