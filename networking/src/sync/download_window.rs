use containers::{Height, RawBlock};
use std::collections::BTreeMap;
use tracing::warn;

use super::{config::WindowLimits, states::FetchStatus};
use crate::client::FetchError;

enum FetchRecord {
    Running,
    /// `None` when the height is above the remote chain tip.
    Completed(Option<RawBlock>),
    Failed(FetchError),
}

impl FetchRecord {
    fn status(&self) -> FetchStatus {
        match self {
            FetchRecord::Running => FetchStatus::Running,
            FetchRecord::Completed(_) => FetchStatus::Completed,
            FetchRecord::Failed(_) => FetchStatus::Failed,
        }
    }
}

/// Why the window stopped scheduling new heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// A fetch found this height above the remote chain tip.
    ChainTip(Height),
    /// A fetch for this height exhausted its retry budget.
    Failed(Height),
}

impl Halt {
    pub fn height(&self) -> Height {
        match self {
            Halt::ChainTip(height) | Halt::Failed(height) => *height,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub buffered: usize,
}

/// Result of trying to consume the height at the cursor.
pub enum Next {
    Ready { height: Height, block: Option<RawBlock> },
    Failed { height: Height, error: FetchError },
    /// The fetch for the cursor has not resolved yet.
    Pending,
    /// Nothing is held at the cursor and nothing will be scheduled.
    Halted(Height),
}

/// Fetch records keyed by height.
///
/// Heights held always form the contiguous range `[cursor, next_scheduled)`:
/// heights are only inserted at `next_scheduled` and only removed at
/// `cursor`, so no height is scheduled twice and nothing below the cursor is
/// retained.
pub struct DownloadWindow {
    records: BTreeMap<Height, FetchRecord>,
    cursor: Height,
    next_scheduled: Height,
    running: usize,
    completed: usize,
    failed: usize,
    halt: Option<Halt>,
}

impl DownloadWindow {
    pub fn new(from: Height) -> Self {
        Self {
            records: BTreeMap::new(),
            cursor: from,
            next_scheduled: from,
            running: 0,
            completed: 0,
            failed: 0,
            halt: None,
        }
    }

    /// Next height the ordered pop will deliver.
    pub fn cursor(&self) -> Height {
        self.cursor
    }

    pub fn next_scheduled(&self) -> Height {
        self.next_scheduled
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn halt(&self) -> Option<Halt> {
        self.halt
    }

    pub fn status(&self, height: Height) -> FetchStatus {
        self.records
            .get(&height)
            .map(FetchRecord::status)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> WindowStats {
        WindowStats {
            running: self.running,
            completed: self.completed,
            failed: self.failed,
            buffered: self.records.len(),
        }
    }

    pub fn can_schedule(&self, limits: &WindowLimits) -> bool {
        self.halt.is_none() && self.records.len() < limits.max_blocks && self.running < limits.concurrency
    }

    /// Record a fetch as running for the next unscheduled height.
    pub fn schedule(&mut self) -> Height {
        let height = self.next_scheduled;
        self.records.insert(height, FetchRecord::Running);
        self.running += 1;
        self.next_scheduled = height.next();
        height
    }

    /// Store the outcome of the fetch for `height`.
    ///
    /// A chain tip or a failure halts scheduling.
    pub fn resolve(&mut self, height: Height, result: Result<Option<RawBlock>, FetchError>) {
        let Some(record) = self.records.get_mut(&height) else {
            warn!(height = height.0, "Fetch resolved for a height outside the window");
            return;
        };
        let target = match result {
            Ok(_) => FetchStatus::Completed,
            Err(_) => FetchStatus::Failed,
        };
        if !record.status().can_transition_to(target) {
            warn!(
                height = height.0,
                from = ?record.status(),
                to = ?target,
                "Ignoring invalid fetch transition"
            );
            return;
        }

        self.running -= 1;
        let halt = match result {
            Ok(block) => {
                self.completed += 1;
                let halt = block.is_none().then_some(Halt::ChainTip(height));
                *record = FetchRecord::Completed(block);
                halt
            }
            Err(error) => {
                self.failed += 1;
                *record = FetchRecord::Failed(error);
                Some(Halt::Failed(height))
            }
        };
        if let Some(halt) = halt {
            self.halt_at(halt);
        }
    }

    /// Fail every running fetch. Used when fetch tasks are lost.
    pub fn abandon_running(&mut self) {
        let running: Vec<Height> = self
            .records
            .iter()
            .filter(|(_, record)| matches!(record, FetchRecord::Running))
            .map(|(height, _)| *height)
            .collect();
        for height in running {
            self.resolve(height, Err(FetchError::TaskAborted(height)));
        }
    }

    fn halt_at(&mut self, halt: Halt) {
        match self.halt {
            Some(existing) if existing.height() <= halt.height() => {}
            _ => self.halt = Some(halt),
        }
    }

    /// Consume the record at the cursor if its fetch has resolved.
    ///
    /// A failed record is removed without advancing the cursor, so later
    /// calls report [`Next::Halted`] at that height.
    pub fn take_next(&mut self) -> Next {
        let height = self.cursor;
        match self.records.get(&height).map(FetchRecord::status) {
            None if self.halt.is_some() => return Next::Halted(height),
            None | Some(FetchStatus::Running) | Some(FetchStatus::Unscheduled) => return Next::Pending,
            Some(FetchStatus::Completed) | Some(FetchStatus::Failed) => {}
        }

        match self.records.remove(&height) {
            Some(FetchRecord::Completed(block)) => {
                self.completed -= 1;
                self.cursor = height.next();
                Next::Ready { height, block }
            }
            Some(FetchRecord::Failed(error)) => {
                self.failed -= 1;
                self.halt_at(Halt::Failed(height));
                Next::Failed { height, error }
            }
            Some(FetchRecord::Running) => {
                self.records.insert(height, FetchRecord::Running);
                Next::Pending
            }
            None => Next::Pending,
        }
    }
}
