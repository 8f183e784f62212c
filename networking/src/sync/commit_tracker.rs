use containers::{Checkpoint, Height};
use std::collections::BTreeSet;
use tracing::warn;

/// Reorders out-of-order commit reports into a gapless checkpoint.
///
/// `next_commit` is the first height not yet known to be committed. Reports
/// above it wait in `pending` until the gap below them closes. Owned by a
/// single consumer, so no locking is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTracker {
    next_commit: Height,
    pending: BTreeSet<Height>,
}

impl CommitTracker {
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            next_commit: checkpoint.next_height,
            pending: BTreeSet::new(),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.next_commit)
    }

    /// Heights committed above a gap.
    pub fn pending(&self) -> impl Iterator<Item = Height> + '_ {
        self.pending.iter().copied()
    }

    /// Record `height` as committed.
    ///
    /// Returns the new checkpoint when the contiguous committed prefix grew.
    /// A run of pending heights closed by one report yields a single
    /// checkpoint covering all of them.
    pub fn record(&mut self, height: Height) -> Option<Checkpoint> {
        if height < self.next_commit {
            warn!(
                height = height.0,
                next_commit = self.next_commit.0,
                "Commit reported below the checkpoint"
            );
            return None;
        }
        self.pending.insert(height);

        let start = self.next_commit;
        while self.pending.remove(&self.next_commit) {
            self.next_commit = self.next_commit.next();
        }
        (self.next_commit != start).then(|| self.checkpoint())
    }
}
