//! Sync pipeline mirroring a remote node's blocks into storage.
//!
//! This module downloads blocks concurrently but commits them in a way that
//! keeps the persisted checkpoint gapless. It includes:
//!
//! - **Download Window**: Per-height fetch records between the delivery cursor and the next scheduled height
//! - **Block Downloader**: Keeps fetches running under the window limits and pops blocks in height order
//! - **Commit Workers**: OS threads decoding and storing blocks, each with its own store connection
//! - **Commit Tracker**: Folds out-of-order worker reports into a contiguous checkpoint
//! - **Syncer**: Coordinates all of the above and is the only checkpoint writer
//!
//! ## Architecture
//!
//! 1. The Syncer reads the checkpoint and starts the downloader there
//! 2. The downloader fetches ahead of consumption, up to `maxBlocks` heights
//! 3. The Syncer pops blocks in order and dispatches them round-robin
//! 4. Workers report back in any order on a single channel
//! 5. The commit tracker advances the checkpoint over the contiguous prefix
//!
//! ## State Machine
//!
//! - **IDLE**: Not running
//! - **SYNCING**: Downloading and committing
//! - **SYNCED**: Reached the remote chain tip

pub mod commit_tracker;
pub mod config;
pub mod download_window;
pub mod downloader;
pub mod error;
pub mod progress;
pub mod service;
pub mod states;
pub mod worker;

pub use commit_tracker::CommitTracker;
pub use config::*;
pub use download_window::{DownloadWindow, Halt, WindowStats};
pub use downloader::{BlockDownloader, DownloaderMonitor, PoppedBlock};
pub use error::SyncError;
pub use service::{SyncMode, Syncer};
pub use states::{FetchStatus, SyncState};
pub use worker::{CommitJob, CommitReport, WorkerPool};

#[cfg(test)]
mod tests;
