use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use roomchat::{AppState, Hub, activity::SystemClock, config::Config, http};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = Config::from_env()?;
    let app_state = AppState {
        hub: Arc::new(Hub::new(&config, Arc::new(SystemClock))),
    };

    let app = Router::new()
        .merge(http::router())
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        idle_secs = config.idle_threshold.as_secs(),
        history_limit = config.history_limit,
        "listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
