//! nanda-bridge - HTTP Server Entry Point
//!
//! Starts the UI/API server with payment gating enabled.

use nanda_bridge::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nanda_bridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Starting NANDA bridge: agent={} facilitator={} llm={}",
        config.agent_name,
        config.facilitator_url,
        if config.anthropic_api_key.is_some() {
            "configured"
        } else {
            "not configured"
        }
    );

    api::serve(config).await
}
