//! Newslog API Server
//!
//! HTTP API for the curation layer: inbox, feed administration, manual refresh
//! and health probes. Scheduled ingestion runs through `newslog-fetch`.

use std::net::SocketAddr;

use tracing::info;

use newslog_api::bootstrap::{self, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = bootstrap::init()?;

    info!("Starting Newslog API");

    let services = Services::open(&config)?;
    let feeds = services.registry.count_all()?;
    info!("{} feed sources registered", feeds);

    let app = newslog_api::app(services.into_state(config.failing_feed_threshold));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
