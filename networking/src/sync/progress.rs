use containers::{Checkpoint, Height};
use metrics::{DownloaderGauges, SharedMetrics};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::info;

use super::{config::PROGRESS_INTERVAL, download_window::WindowStats, downloader::DownloaderMonitor};

impl From<WindowStats> for DownloaderGauges {
    fn from(stats: WindowStats) -> Self {
        DownloaderGauges {
            running: stats.running,
            completed: stats.completed,
            failed: stats.failed,
            buffered: stats.buffered,
        }
    }
}

/// Counters shared between the syncer and its progress reporter.
#[derive(Debug, Default)]
pub struct Progress {
    checkpoint: AtomicU32,
    committed: AtomicU64,
}

impl Progress {
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint: AtomicU32::new(checkpoint.next_height.0),
            committed: AtomicU64::new(0),
        }
    }

    pub fn set_checkpoint(&self, checkpoint: Checkpoint) {
        self.checkpoint.store(checkpoint.next_height.0, Ordering::Relaxed);
    }

    pub fn checkpoint(&self) -> Height {
        Height(self.checkpoint.load(Ordering::Relaxed))
    }

    pub fn inc_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }
}

/// Aborts the wrapped task when dropped.
pub struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Log pipeline progress once per interval and mirror it into the metrics.
pub fn spawn_reporter(
    chain: String,
    progress: Arc<Progress>,
    monitor: DownloaderMonitor,
    metrics: Option<SharedMetrics>,
) -> AbortOnDrop {
    AbortOnDrop(tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
        interval.tick().await;

        let mut last_committed = progress.committed();
        let mut last_tick = Instant::now();
        loop {
            interval.tick().await;

            let stats = monitor.stats();
            let checkpoint = progress.checkpoint();
            let committed = progress.committed();
            let elapsed = last_tick.elapsed().as_secs_f64();
            let blocks_per_sec = if elapsed > 0.0 {
                (committed - last_committed) as f64 / elapsed
            } else {
                0.0
            };
            last_committed = committed;
            last_tick = Instant::now();

            info!(
                chain = %chain,
                checkpoint = checkpoint.0,
                downloaded = monitor.cursor().0,
                running = stats.running,
                completed = stats.completed,
                buffered = stats.buffered,
                blocks_per_sec = %format!("{blocks_per_sec:.1}"),
                "Sync progress"
            );

            if let Some(metrics) = &metrics {
                metrics.set_downloader(stats.into());
                metrics.set_checkpoint_height(checkpoint.0);
            }
        }
    }))
}
