pub mod server;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use tracing::warn;

/// Snapshot of the download window, published by the progress reporter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DownloaderGauges {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub buffered: usize,
}

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    // Downloader
    downloader_running: IntGauge,
    downloader_completed: IntGauge,
    downloader_failed: IntGauge,
    downloader_buffered: IntGauge,
    fetch_retries: IntCounterVec,
    // Commit pipeline
    checkpoint_height: IntGauge,
    blocks_committed: IntCounter,
    block_commit_time: Histogram,
}

fn register<T: prometheus::core::Collector + Clone + 'static>(
    registry: &Registry,
    collector: T,
) -> prometheus::Result<T> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let downloader_running = register(
            &registry,
            IntGauge::with_opts(Opts::new("mirror_downloader_running", "Block fetches currently running"))?,
        )?;
        let downloader_completed = register(
            &registry,
            IntGauge::with_opts(Opts::new(
                "mirror_downloader_completed",
                "Fetched blocks waiting in the download window",
            ))?,
        )?;
        let downloader_failed = register(
            &registry,
            IntGauge::with_opts(Opts::new(
                "mirror_downloader_failed",
                "Heights whose fetch exhausted the retry budget",
            ))?,
        )?;
        let downloader_buffered = register(
            &registry,
            IntGauge::with_opts(Opts::new("mirror_downloader_buffered", "Heights held by the download window"))?,
        )?;
        let fetch_retries = register(
            &registry,
            IntCounterVec::new(
                Opts::new("mirror_fetch_retries_total", "Total number of retried fetch attempts"),
                &["reason"],
            )?,
        )?;

        let checkpoint_height = register(
            &registry,
            IntGauge::with_opts(Opts::new("mirror_checkpoint_height", "Next height to process"))?,
        )?;
        let blocks_committed = register(
            &registry,
            IntCounter::with_opts(Opts::new(
                "mirror_blocks_committed_total",
                "Total number of blocks written to storage",
            ))?,
        )?;
        let block_commit_time = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new("mirror_block_commit_time_seconds", "Time taken to decode and store a block")
                    .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0]),
            )?,
        )?;

        Ok(Self {
            registry,
            downloader_running,
            downloader_completed,
            downloader_failed,
            downloader_buffered,
            fetch_retries,
            checkpoint_height,
            blocks_committed,
            block_commit_time,
        })
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        if let Err(err) = TextEncoder::new().encode(&metric_families, &mut buffer) {
            warn!(error = %err, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    // Downloader
    pub fn set_downloader(&self, gauges: DownloaderGauges) {
        self.downloader_running.set(gauges.running as i64);
        self.downloader_completed.set(gauges.completed as i64);
        self.downloader_failed.set(gauges.failed as i64);
        self.downloader_buffered.set(gauges.buffered as i64);
    }

    pub fn inc_fetch_retry(&self, reason: &str) {
        self.fetch_retries.with_label_values(&[reason]).inc();
    }

    // Commit pipeline
    pub fn set_checkpoint_height(&self, height: u32) {
        self.checkpoint_height.set(i64::from(height));
    }

    pub fn inc_blocks_committed(&self) {
        self.blocks_committed.inc();
    }

    pub fn observe_block_commit_time(&self, duration: f64) {
        self.block_commit_time.observe(duration);
    }
}

pub type SharedMetrics = Arc<Metrics>;
