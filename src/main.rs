mod agent;
mod config;
mod errors;
mod routes;
mod service;

use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::{CompletionProvider, GeminiAgentService, log_available_models};
use crate::config::Config;
use crate::service::relay_service::RelayService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_chat=debug,chat_core=debug,tower_http=debug".into()),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = Config::from_env().context("Invalid configuration (copy .env.example to .env)")?;

    // ── Provider ──────────────────────────────────────────────────────────────
    let gemini = GeminiAgentService::new(&config).context("Failed to set up the Gemini client")?;
    info!("Using model {}", gemini.model());
    let provider: Arc<dyn CompletionProvider> = Arc::new(gemini);

    tokio::spawn(log_available_models(Arc::clone(&provider)));

    // ── Router ────────────────────────────────────────────────────────────────
    let app = routes::router(RelayService::new(provider))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}
