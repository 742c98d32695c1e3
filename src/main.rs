//! taskboard - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the board API.

use taskboard::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: store={:?}, dev_mode={}, assistant={}",
        config.store_type,
        config.dev_mode,
        config.textgen.is_enabled()
    );
    if config.dev_mode {
        info!("DEV_MODE enabled: all requests run as {}", api::DEV_USER_ID);
    }

    api::serve(config).await?;

    Ok(())
}
