use containers::{Height, RawBlock};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use super::{
    config::WindowLimits,
    download_window::{DownloadWindow, Next, WindowStats},
    error::{Result, SyncError},
};
use crate::client::BlockSource;

/// A height handed out by [`BlockDownloader::pop_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoppedBlock {
    pub height: Height,
    /// `None` once the remote chain tip is reached; stop popping.
    pub block: Option<RawBlock>,
}

struct Shared {
    window: Mutex<DownloadWindow>,
    /// Signalled whenever a fetch resolves.
    resolved: Notify,
    /// Signalled whenever the ordered pop frees a window slot.
    freed: Notify,
}

/// Read-only view of a downloader's window, for progress reporting.
#[derive(Clone)]
pub struct DownloaderMonitor {
    shared: Arc<Shared>,
}

impl DownloaderMonitor {
    pub fn stats(&self) -> WindowStats {
        self.shared.window.lock().stats()
    }

    pub fn cursor(&self) -> Height {
        self.shared.window.lock().cursor()
    }
}

/// Windowed concurrent block downloader with ordered delivery.
///
/// A scheduling task keeps up to `concurrency` fetches running while the
/// window holds fewer than `max_blocks` heights. Fetches complete in any
/// order; [`pop_next`](Self::pop_next) hands them out strictly by height.
///
/// Dropping the downloader tears the scheduling task down together with every
/// fetch still running.
pub struct BlockDownloader {
    shared: Arc<Shared>,
    scheduler: JoinHandle<()>,
}

impl BlockDownloader {
    /// Start fetching at `from`. Must be called within a tokio runtime.
    pub fn start<S: BlockSource>(source: Arc<S>, limits: WindowLimits, from: Height) -> Self {
        let shared = Arc::new(Shared {
            window: Mutex::new(DownloadWindow::new(from)),
            resolved: Notify::new(),
            freed: Notify::new(),
        });
        info!(
            from = from.0,
            max_blocks = limits.max_blocks,
            concurrency = limits.concurrency,
            "Starting block downloader"
        );
        let scheduler = tokio::spawn(schedule_loop(source, limits, shared.clone()));
        Self { shared, scheduler }
    }

    /// Wait for the block at the cursor and consume it.
    ///
    /// Heights come out as `from, from + 1, ...` regardless of the order in
    /// which fetches complete. A failed fetch surfaces as an error, after which
    /// every call fails. Cancelling the returned future never loses a block.
    pub async fn pop_next(&self) -> Result<PoppedBlock> {
        loop {
            let resolved = self.shared.resolved.notified();
            tokio::pin!(resolved);
            resolved.as_mut().enable();

            let next = self.shared.window.lock().take_next();
            match next {
                Next::Ready { height, block } => {
                    self.shared.freed.notify_one();
                    return Ok(PoppedBlock { height, block });
                }
                Next::Failed { height, error } => {
                    return Err(SyncError::Fetch { height, source: error });
                }
                Next::Halted(height) => return Err(SyncError::DownloaderHalted(height)),
                Next::Pending => resolved.await,
            }
        }
    }

    pub fn monitor(&self) -> DownloaderMonitor {
        DownloaderMonitor {
            shared: self.shared.clone(),
        }
    }

    pub fn stats(&self) -> WindowStats {
        self.shared.window.lock().stats()
    }

    pub fn running_count(&self) -> usize {
        self.stats().running
    }

    pub fn completed_count(&self) -> usize {
        self.stats().completed
    }

    pub fn failed_count(&self) -> usize {
        self.stats().failed
    }

    pub fn block_count(&self) -> usize {
        self.stats().buffered
    }

    /// Next height that would be scheduled.
    pub fn next_height(&self) -> Height {
        self.shared.window.lock().next_scheduled()
    }
}

impl Drop for BlockDownloader {
    fn drop(&mut self) {
        self.scheduler.abort();
    }
}

async fn schedule_loop<S: BlockSource>(source: Arc<S>, limits: WindowLimits, shared: Arc<Shared>) {
    let mut fetches = JoinSet::new();

    loop {
        let halt = {
            let mut window = shared.window.lock();
            while window.can_schedule(&limits) {
                let height = window.schedule();
                let source = source.clone();
                fetches.spawn(async move { (height, source.fetch_block(height).await) });
            }
            window.halt()
        };

        if let Some(halt) = halt {
            if fetches.is_empty() {
                debug!(halt = ?halt, "Block downloader stopped scheduling");
                return;
            }
        }

        tokio::select! {
            Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                match joined {
                    Ok((height, result)) => {
                        if let Err(err) = &result {
                            error!(height = height.0, error = %err, "Block fetch failed");
                        }
                        shared.window.lock().resolve(height, result);
                    }
                    Err(err) => {
                        error!(error = %err, "Block fetch task died");
                        fetches.abort_all();
                        shared.window.lock().abandon_running();
                    }
                }
                shared.resolved.notify_waiters();
            }
            _ = shared.freed.notified() => {}
        }
    }
}
