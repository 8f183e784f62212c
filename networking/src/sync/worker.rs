//! Commit workers.
//!
//! Each worker is an OS thread with its own storage connection. Jobs arrive on
//! a per-worker channel and every outcome is reported on one shared channel,
//! so the syncer sees completions as a single serialized stream.

use containers::{Height, RawBlock};
use std::thread;
use std::time::{Duration, Instant};
use storage::{BlockStore, StorageError, StoreConnector};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use super::error::{Result, SyncError};

#[derive(Debug)]
pub struct CommitJob {
    pub height: Height,
    pub block: RawBlock,
}

#[derive(Debug)]
pub struct CommitReport {
    pub worker: usize,
    pub height: Height,
    pub elapsed: Duration,
    pub result: std::result::Result<(), StorageError>,
}

/// Fixed pool of commit workers fed round-robin.
pub struct WorkerPool {
    senders: Vec<UnboundedSender<CommitJob>>,
    handles: Vec<thread::JoinHandle<()>>,
    next: usize,
}

impl WorkerPool {
    /// Connect `count` stores and start one thread per store.
    ///
    /// Workers never write the checkpoint. Reports go to `replies`; once every
    /// worker has exited the receiving side observes a closed channel.
    pub fn spawn<C: StoreConnector>(
        connector: &C,
        chain: &str,
        key_prefix: &str,
        count: usize,
        replies: UnboundedSender<CommitReport>,
    ) -> Result<Self> {
        let mut senders = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);

        for worker in 0..count {
            let store = BlockStore::new(connector.connect()?, chain, key_prefix);
            let (sender, jobs) = mpsc::unbounded_channel();
            let replies = replies.clone();
            let handle = thread::Builder::new()
                .name(format!("commit-worker-{worker}"))
                .spawn(move || run_worker(worker, store, jobs, replies))
                .map_err(SyncError::Spawn)?;
            senders.push(sender);
            handles.push(handle);
        }

        debug!(workers = count, chain = chain, "Commit workers started");
        Ok(Self {
            senders,
            handles,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Hand `job` to the next worker in round-robin order.
    pub fn dispatch(&mut self, job: CommitJob) -> Result<usize> {
        if self.senders.is_empty() {
            return Err(SyncError::WorkersGone(1));
        }
        let worker = self.next;
        self.next = (self.next + 1) % self.senders.len();
        self.senders[worker]
            .send(job)
            .map_err(|_| SyncError::WorkerGone(worker))?;
        Ok(worker)
    }

    /// Close the job channels and wait for every worker to exit.
    ///
    /// Jobs already queued are still committed before a worker exits.
    pub async fn shutdown(self) -> Result<()> {
        let Self { senders, handles, .. } = self;
        drop(senders);
        tokio::task::spawn_blocking(move || {
            for handle in handles {
                if handle.join().is_err() {
                    tracing::error!("Commit worker panicked");
                }
            }
        })
        .await?;
        Ok(())
    }
}

fn run_worker<S: storage::KeyValueStore>(
    worker: usize,
    store: BlockStore<S>,
    mut jobs: UnboundedReceiver<CommitJob>,
    replies: UnboundedSender<CommitReport>,
) {
    while let Some(CommitJob { height, block }) = jobs.blocking_recv() {
        let started = Instant::now();
        let result = store.accept_block(height, &block, false).map(|_| ());
        let elapsed = started.elapsed();
        trace!(worker, height = height.0, ?elapsed, "Worker committed block");

        let report = CommitReport {
            worker,
            height,
            elapsed,
            result,
        };
        if replies.send(report).is_err() {
            break;
        }
    }
}
