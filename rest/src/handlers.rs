use axum::extract::{Path, Query, State};
use axum::response::Response;
use containers::{BlockHash, Height, Txid};
use serde::Deserialize;
use std::sync::Arc;
use storage::{BlockStore, KeyValueStore};

use crate::format::{split_extension, Format};
use crate::ApiError;

/// Number of headers returned when `count` is not given.
pub const DEFAULT_HEADERS_COUNT: u32 = 5;

/// Shared state for REST handlers.
pub struct AppState<S> {
    store: Arc<BlockStore<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: KeyValueStore + 'static> AppState<S> {
    pub fn new(store: BlockStore<S>) -> Self {
        Self { store: Arc::new(store) }
    }

    /// Run a storage query off the async executor.
    async fn query<T, F>(&self, query: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&BlockStore<S>) -> storage::Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || query(&store))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        Ok(result?)
    }
}

#[derive(Debug, Deserialize)]
pub struct HeadersQuery {
    count: Option<u32>,
}

fn parse<T>(id: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = containers::ParseError>,
{
    id.parse().map_err(|err: containers::ParseError| ApiError::BadRequest(err.to_string()))
}

/// Handler for `GET /rest/tx/{txid}.{ext}`.
pub async fn tx_handler<S: KeyValueStore + 'static>(
    State(state): State<AppState<S>>,
    Path(segment): Path<String>,
) -> Result<Response, ApiError> {
    let (id, ext) = split_extension(&segment)?;
    let txid: Txid = parse(id)?;

    let tx = state
        .query(move |store| store.get_transaction(&txid))
        .await?
        .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    ext.parse::<Format>()?.respond(tx)
}

/// Handler for `GET /rest/block/{hash}.{ext}`.
pub async fn block_handler<S: KeyValueStore + 'static>(
    State(state): State<AppState<S>>,
    Path(segment): Path<String>,
) -> Result<Response, ApiError> {
    let (id, ext) = split_extension(&segment)?;
    let hash: BlockHash = parse(id)?;

    let block = state
        .query(move |store| store.get_block_by_hash(&hash))
        .await?
        .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    ext.parse::<Format>()?.respond(block)
}

/// Handler for `GET /rest/headers/{hash}.{ext}?count=N`.
///
/// Returns up to `count` consecutive headers starting at `hash`, fewer when
/// the mirror does not hold that many yet.
pub async fn headers_handler<S: KeyValueStore + 'static>(
    State(state): State<AppState<S>>,
    Path(segment): Path<String>,
    Query(query): Query<HeadersQuery>,
) -> Result<Response, ApiError> {
    let (id, ext) = split_extension(&segment)?;
    let hash: BlockHash = parse(id)?;
    let count = query.count.unwrap_or(DEFAULT_HEADERS_COUNT);

    let headers = state
        .query(move |store| store.get_headers(&hash, count))
        .await?
        .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    ext.parse::<Format>()?.respond(headers.concat())
}

/// Handler for `GET /rest/blockhashbyheight/{height}.{ext}`.
///
/// `bin` answers the hash in wire order, `hex` in display order.
pub async fn block_hash_by_height_handler<S: KeyValueStore + 'static>(
    State(state): State<AppState<S>>,
    Path(segment): Path<String>,
) -> Result<Response, ApiError> {
    let (id, ext) = split_extension(&segment)?;
    let height: Height = parse(id)?;

    let hash = state
        .query(move |store| store.get_block_hash_by_height(height))
        .await?
        .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    match ext.parse::<Format>()? {
        Format::Hex => Format::Hex.respond(hash.to_display_bytes()),
        format => format.respond(hash.as_bytes()),
    }
}
