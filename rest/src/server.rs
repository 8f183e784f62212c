use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use storage::{BlockStore, KeyValueStore};
use tracing::info;

use crate::handlers::{block_handler, block_hash_by_height_handler, headers_handler, tx_handler, AppState};
use crate::ApiError;

pub fn create_app<S: KeyValueStore + 'static>(store: BlockStore<S>) -> Router {
    Router::new()
        .route("/rest/tx/:id", get(tx_handler::<S>))
        .route("/rest/block/:id", get(block_handler::<S>))
        .route("/rest/headers/:id", get(headers_handler::<S>))
        .route("/rest/blockhashbyheight/:height", get(block_hash_by_height_handler::<S>))
        .fallback(|| async { ApiError::NoRoute })
        .with_state(AppState::new(store))
}

pub async fn run_rest_server(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind REST server to {addr}"))?;
    info!(%addr, "REST server listening");

    axum::serve(listener, app).await.context("REST server failed")?;

    Ok(())
}
