//! Two-step block lookup against a node's REST interface.
//!
//! A height is resolved to a block hash with `blockhashbyheight/{height}.bin`
//! and the block itself is then read from `block/{hash}.bin`. Both steps share
//! one retry budget per height.

use bytes::Bytes;
use containers::{BlockHash, Height, RawBlock};
use env_config::SyncConfig;
use metrics::SharedMetrics;
use reqwest::Client as ReqwestClient;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of the body returned by the node for heights above its tip.
pub const OUT_OF_RANGE_SENTINEL: &str = "Block height out of range";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch block {height}: max retry count of {attempts} reached")]
    MaxRetriesExceeded { height: Height, attempts: u32 },
    #[error("fetch task for block {0} stopped before producing a result")]
    TaskAborted(Height),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// Status and body of a REST response. Non-OK statuses are not errors at
/// this level since the node reports the chain tip through one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RestResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// GET requests relative to a REST base URL.
///
/// Abstracts the HTTP client to allow testing with mocks.
#[async_trait::async_trait]
pub trait RestTransport: Send + Sync {
    async fn get(&self, path: &str) -> Result<RestResponse, TransportError>;
}

pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = ReqwestClient::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl RestTransport for HttpTransport {
    async fn get(&self, path: &str) -> Result<RestResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RestResponse { status, body })
    }
}

/// Anything able to produce the block at a height.
///
/// `Ok(None)` means the height is above the remote chain tip.
#[async_trait::async_trait]
pub trait BlockSource: Send + Sync + 'static {
    async fn fetch_block(&self, height: Height) -> Result<Option<RawBlock>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The hash lookup did not answer with 32 bytes.
    MalformedHash,
    /// The block body is no longer than a bare header.
    UndersizedBlock,
    Status(u16),
    Transport,
}

impl RetryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::MalformedHash => "malformed_hash",
            RetryReason::UndersizedBlock => "undersized_block",
            RetryReason::Status(_) => "http_status",
            RetryReason::Transport => "transport",
        }
    }

    /// Malformed hashes are retried right away, everything else waits.
    fn backs_off(&self) -> bool {
        !matches!(self, RetryReason::MalformedHash)
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Status(status) => write!(f, "http status {status}"),
            other => f.write_str(other.as_str()),
        }
    }
}

enum Attempt {
    Block(RawBlock),
    ChainTip,
    Retry(RetryReason),
}

pub struct FetchClient<T> {
    transport: T,
    retry_budget: u32,
    retry_backoff: Duration,
    metrics: Option<SharedMetrics>,
}

impl FetchClient<HttpTransport> {
    pub fn http(rest_url: &str, config: &SyncConfig) -> Result<Self, FetchError> {
        Ok(Self::new(HttpTransport::new(rest_url, config.request_timeout())?, config))
    }
}

impl<T: RestTransport> FetchClient<T> {
    pub fn new(transport: T, config: &SyncConfig) -> Self {
        Self {
            transport,
            retry_budget: config.retry_budget,
            retry_backoff: config.retry_backoff(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn attempt(&self, height: Height) -> Attempt {
        let response = match self.transport.get(&format!("blockhashbyheight/{height}.bin")).await {
            Ok(response) => response,
            Err(err) => {
                debug!(height = height.0, error = %err, "Block hash request failed");
                return Attempt::Retry(RetryReason::Transport);
            }
        };

        if response.body.len() != 32 {
            if response.body.starts_with(OUT_OF_RANGE_SENTINEL.as_bytes()) {
                return Attempt::ChainTip;
            }
            return Attempt::Retry(RetryReason::MalformedHash);
        }
        let Some(hash) = BlockHash::from_slice(&response.body).filter(|_| response.is_success()) else {
            return Attempt::Retry(RetryReason::MalformedHash);
        };

        let response = match self.transport.get(&format!("block/{hash}.bin")).await {
            Ok(response) => response,
            Err(err) => {
                debug!(height = height.0, hash = %hash, error = %err, "Block request failed");
                return Attempt::Retry(RetryReason::Transport);
            }
        };
        if !response.is_success() {
            return Attempt::Retry(RetryReason::Status(response.status));
        }

        let block = RawBlock::new(response.body);
        if !block.is_structurally_valid() {
            return Attempt::Retry(RetryReason::UndersizedBlock);
        }
        Attempt::Block(block)
    }
}

#[async_trait::async_trait]
impl<T: RestTransport + 'static> BlockSource for FetchClient<T> {
    async fn fetch_block(&self, height: Height) -> Result<Option<RawBlock>, FetchError> {
        for attempt in 1..=self.retry_budget {
            let reason = match self.attempt(height).await {
                Attempt::Block(block) => return Ok(Some(block)),
                Attempt::ChainTip => {
                    debug!(height = height.0, "Height is above the remote chain tip");
                    return Ok(None);
                }
                Attempt::Retry(reason) => reason,
            };

            warn!(
                height = height.0,
                attempt = attempt,
                budget = self.retry_budget,
                reason = %reason,
                "Retrying block fetch"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_fetch_retry(reason.as_str());
            }
            if reason.backs_off() && attempt < self.retry_budget {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }

        Err(FetchError::MaxRetriesExceeded {
            height,
            attempts: self.retry_budget,
        })
    }
}
