use containers::Height;
use storage::StorageError;
use thiserror::Error;

use crate::client::FetchError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("download of block {height} failed: {source}")]
    Fetch {
        height: Height,
        #[source]
        source: FetchError,
    },
    #[error("downloader stopped before delivering block {0}")]
    DownloaderHalted(Height),
    #[error("worker {worker} failed to commit block {height}: {source}")]
    Worker {
        worker: usize,
        height: Height,
        #[source]
        source: StorageError,
    },
    #[error("commit worker {0} is no longer running")]
    WorkerGone(usize),
    #[error("all commit workers stopped with {0} jobs in flight")]
    WorkersGone(usize),
    #[error("failed to spawn commit worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
