//! Sync pipeline limits and intervals.
//!
//! Tunables come from [`env_config::SyncConfig`]; the constants below are not
//! worth exposing in the config file.
use env_config::SyncConfig;
use std::time::Duration;

/// Interval between progress reports.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Bounds of the download window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    /// Maximum heights held, running or completed.
    pub max_blocks: usize,
    /// Maximum fetches running at once.
    pub concurrency: usize,
}

impl From<&SyncConfig> for WindowLimits {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_blocks: config.max_blocks,
            concurrency: config.concurrency,
        }
    }
}
