// Gazetteer proxy entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr; this process owns no terminal UI)
// 2. Load config
// 3. Build the provider from config
// 4. Build the router and serve on the configured port

use gazetteer::config;
use gazetteer::server::provider;
use gazetteer::server::{build_router, AppState};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gazetteer=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    info!("Gazetteer proxy starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: provider={}, model={}",
        config.provider.kind, config.provider.model
    );

    // 3. Build the provider
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;
    let generator = provider::from_config(http, &config).context("failed to build provider")?;
    let state = AppState::new(Arc::from(generator));

    // 4. Serve
    let addr = format!("127.0.0.1:{}", config.proxy.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Proxy listening on {addr}");

    axum::serve(listener, build_router(state))
        .await
        .context("server error")?;

    Ok(())
}
