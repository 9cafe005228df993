//! Cinesync relay server binary.

use cinesync_server::config::ServerConfig;
use cinesync_server::{AppState, app};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let state = AppState::new(config.relay_capacity);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    tracing::info!("Server listening on {addr}");
    tracing::info!("  - Room API: http://{addr}/api/party/*");
    tracing::info!("  - Relay:    ws://{addr}/ws/{{room_id}}");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
