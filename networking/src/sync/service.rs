//! Syncer driving the downloader and the commit workers.
//!
//! The Syncer is the only writer of the checkpoint. It:
//! - Resumes the downloader at the persisted checkpoint
//! - Round-robins popped blocks to the commit workers, bounded by the
//!   in-flight limit
//! - Folds worker reports into the checkpoint through the commit tracker
//! - Manages IDLE -> SYNCING -> SYNCED transitions

use containers::{Checkpoint, Height, RawBlock};
use env_config::SyncConfig;
use metrics::SharedMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::{BlockStore, StoreConnector};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, trace, warn};

use super::{
    commit_tracker::CommitTracker,
    config::WindowLimits,
    downloader::{BlockDownloader, PoppedBlock},
    error::{Result, SyncError},
    progress::{spawn_reporter, Progress},
    states::SyncState,
    worker::{CommitJob, CommitReport, WorkerPool},
};
use crate::client::BlockSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Commit on a worker pool and reorder completions.
    #[default]
    Pipelined,
    /// Commit each block inline, in height order, advancing the checkpoint
    /// with every block.
    Sequential,
}

pub struct Syncer<C, S> {
    connector: C,
    source: Arc<S>,
    chain: String,
    key_prefix: String,
    config: SyncConfig,
    metrics: Option<SharedMetrics>,
    state: SyncState,
}

impl<C: StoreConnector, S: BlockSource> Syncer<C, S> {
    pub fn new(
        connector: C,
        source: Arc<S>,
        chain: impl Into<String>,
        key_prefix: impl Into<String>,
        config: SyncConfig,
    ) -> Self {
        Self {
            connector,
            source,
            chain: chain.into(),
            key_prefix: key_prefix.into(),
            config,
            metrics: None,
            state: SyncState::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get current sync state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    fn transition(&mut self, target: SyncState) {
        if self.state == target {
            return;
        }
        if !self.state.can_transition_to(target) {
            warn!(from = ?self.state, to = ?target, "Invalid sync state transition");
            return;
        }
        debug!(from = ?self.state, to = ?target, "Sync state transition");
        self.state = target;
    }

    /// Sync from the persisted checkpoint up to the remote chain tip.
    ///
    /// Returns the checkpoint reached. Any failed fetch or commit aborts the
    /// run; the checkpoint then still covers only fully committed heights.
    pub async fn run_once(&mut self, mode: SyncMode) -> Result<Checkpoint> {
        self.transition(SyncState::Syncing);
        let result = self.sync_to_tip(mode).await;
        match &result {
            Ok(checkpoint) => {
                info!(
                    chain = %self.chain,
                    next_height = checkpoint.next_height.0,
                    "Reached chain tip"
                );
                self.transition(SyncState::Synced);
            }
            Err(err) => {
                error!(chain = %self.chain, error = %err, "Sync run failed");
                self.transition(SyncState::Idle);
            }
        }
        result
    }

    /// Keep syncing as the remote tip advances. Only returns on error.
    pub async fn follow(&mut self, mode: SyncMode) -> Result<()> {
        loop {
            let checkpoint = self.run_once(mode).await?;
            debug!(
                next_height = checkpoint.next_height.0,
                interval = ?self.config.follow_interval(),
                "Waiting for new blocks"
            );
            tokio::time::sleep(self.config.follow_interval()).await;
        }
    }

    async fn sync_to_tip(&self, mode: SyncMode) -> Result<Checkpoint> {
        let store = BlockStore::new(self.connector.connect()?, self.chain.as_str(), self.key_prefix.as_str());
        let checkpoint = store.get_checkpoint()?;
        info!(
            chain = %self.chain,
            from = checkpoint.next_height.0,
            mode = ?mode,
            "Resuming from checkpoint"
        );

        let downloader = BlockDownloader::start(
            self.source.clone(),
            WindowLimits::from(&self.config),
            checkpoint.next_height,
        );
        let progress = Arc::new(Progress::new(checkpoint));
        let _reporter = spawn_reporter(
            self.chain.clone(),
            progress.clone(),
            downloader.monitor(),
            self.metrics.clone(),
        );

        match mode {
            SyncMode::Pipelined => self.run_pipelined(&store, &downloader, &progress, checkpoint).await,
            SyncMode::Sequential => self.run_sequential(store, &downloader, &progress).await,
        }
    }

    async fn run_pipelined(
        &self,
        store: &BlockStore<C::Store>,
        downloader: &BlockDownloader,
        progress: &Progress,
        checkpoint: Checkpoint,
    ) -> Result<Checkpoint> {
        let (replies_tx, mut replies) = mpsc::unbounded_channel();
        let mut pool = WorkerPool::spawn(
            &self.connector,
            &self.chain,
            &self.key_prefix,
            self.config.workers(),
            replies_tx,
        )?;
        let mut tracker = CommitTracker::new(checkpoint);

        let result = self
            .dispatch_and_commit(store, downloader, progress, &mut pool, &mut replies, &mut tracker)
            .await;
        let shutdown = pool.shutdown().await;
        let checkpoint = result?;
        shutdown?;
        Ok(checkpoint)
    }

    async fn dispatch_and_commit(
        &self,
        store: &BlockStore<C::Store>,
        downloader: &BlockDownloader,
        progress: &Progress,
        pool: &mut WorkerPool,
        replies: &mut UnboundedReceiver<CommitReport>,
        tracker: &mut CommitTracker,
    ) -> Result<Checkpoint> {
        let in_flight_limit = self.config.in_flight_multiplier * pool.len();
        let mut in_flight = 0usize;
        let mut dispatching = true;

        while dispatching || in_flight > 0 {
            tokio::select! {
                biased;

                report = replies.recv(), if in_flight > 0 => {
                    let Some(report) = report else {
                        return Err(SyncError::WorkersGone(in_flight));
                    };
                    in_flight -= 1;
                    self.handle_report(store, progress, tracker, report)?;
                }

                popped = downloader.pop_next(), if dispatching && in_flight < in_flight_limit => {
                    match popped? {
                        PoppedBlock { height, block: Some(block) } => {
                            let worker = pool.dispatch(CommitJob { height, block })?;
                            in_flight += 1;
                            trace!(height = height.0, worker, in_flight, "Dispatched block");
                        }
                        PoppedBlock { height, block: None } => {
                            debug!(height = height.0, in_flight, "Chain tip reached, draining workers");
                            dispatching = false;
                        }
                    }
                }
            }
        }

        Ok(tracker.checkpoint())
    }

    fn handle_report(
        &self,
        store: &BlockStore<C::Store>,
        progress: &Progress,
        tracker: &mut CommitTracker,
        report: CommitReport,
    ) -> Result<()> {
        let CommitReport {
            worker,
            height,
            elapsed,
            result,
        } = report;
        result.map_err(|source| SyncError::Worker { worker, height, source })?;
        self.record_commit(progress, elapsed);

        if let Some(checkpoint) = tracker.record(height) {
            store.set_checkpoint(checkpoint)?;
            progress.set_checkpoint(checkpoint);
            trace!(next_height = checkpoint.next_height.0, "Checkpoint advanced");
        }
        Ok(())
    }

    async fn run_sequential(
        &self,
        store: BlockStore<C::Store>,
        downloader: &BlockDownloader,
        progress: &Progress,
    ) -> Result<Checkpoint> {
        let store = Arc::new(store);
        loop {
            let PoppedBlock { height, block } = downloader.pop_next().await?;
            let Some(block) = block else {
                return Ok(Checkpoint::new(height));
            };

            let started = Instant::now();
            commit_blocking(store.clone(), height, block).await?;
            self.record_commit(progress, started.elapsed());
            progress.set_checkpoint(Checkpoint::after(height));
        }
    }

    fn record_commit(&self, progress: &Progress, elapsed: Duration) {
        progress.inc_committed();
        if let Some(metrics) = &self.metrics {
            metrics.inc_blocks_committed();
            metrics.observe_block_commit_time(elapsed.as_secs_f64());
        }
    }
}

async fn commit_blocking<K>(store: Arc<BlockStore<K>>, height: Height, block: RawBlock) -> Result<()>
where
    K: storage::KeyValueStore + 'static,
{
    tokio::task::spawn_blocking(move || store.accept_block(height, &block, true)).await??;
    Ok(())
}
