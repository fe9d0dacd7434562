use anyhow::Context;
use clap::Parser;
use meshroom_server::{AppState, ServerConfig, router};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    config.validate()?;
    info!("Initializing signaling server: {:?}", config);

    let state = Arc::new(AppState::new(config.room_inbox));
    let mut app = router(state);
    if let Some(cors) = config.cors_layer()? {
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Signaling server listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("server error")?;

    Ok(())
}
