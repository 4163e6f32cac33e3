//! HTTP server entry point.

use crate::api::{self, AppState};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Bind the listener and serve the API until shutdown.
pub async fn run_server(listen_addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let router = api::router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
