use std::{net::SocketAddr, sync::Arc};

use llm_core::GeminiBackend;
use tokio::net::TcpListener;
use tracing::{info, warn};

use relay_server::config::ServerConfig;
use relay_server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting chat relay server...");

    // Load configuration from environment
    let config = ServerConfig::from_env()?;
    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, chat_model={}, tts_model={}",
        config.port, config.rate_limit_per_minute, config.gemini.chat_model, config.gemini.tts_model
    );
    info!(
        "Ingestion: {} checks every {}ms, max upload {} bytes",
        config.ingestion.max_attempts,
        config.ingestion.interval.as_millis(),
        config.max_upload_bytes
    );
    if config.fallback_api_key.is_none() {
        warn!("GEMINI_API_KEY not set, every request must carry its own X-API-Key");
    }

    let backend = Arc::new(GeminiBackend::new(config.gemini.clone()));
    let port = config.port;
    let app = app(AppState::new(config, backend))?;

    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
