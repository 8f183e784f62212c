use containers::{Height, Txid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to decode block at height {height}: {source}")]
    MalformedBlock {
        height: Height,
        #[source]
        source: bitcoin::consensus::encode::Error,
    },

    /// The transaction index names a body that was never stored.
    #[error("transaction not found: {0}")]
    TransactionNotFound(Txid),

    #[error("corrupt value under {key}: {reason}")]
    CorruptValue { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;
