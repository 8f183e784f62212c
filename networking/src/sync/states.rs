//! State machines of the sync pipeline.

/// Lifecycle of one height inside the download window.
///
/// Heights are `Unscheduled` until the scheduling loop launches a fetch for
/// them. Terminal records are removed when the ordered pop consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Unscheduled,
    Running,
    /// The fetch produced a block, or found the height above the chain tip.
    Completed,
    /// The fetch exhausted its retry budget.
    Failed,
}

impl FetchStatus {
    pub fn can_transition_to(&self, target: FetchStatus) -> bool {
        match self {
            FetchStatus::Unscheduled => matches!(target, FetchStatus::Running),
            FetchStatus::Running => matches!(target, FetchStatus::Completed | FetchStatus::Failed),
            FetchStatus::Completed | FetchStatus::Failed => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FetchStatus::Completed | FetchStatus::Failed)
    }
}

/// Syncer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Not running, either before the first run or after a failed one.
    #[default]
    Idle,

    /// Downloading and committing blocks.
    Syncing,

    /// The last run reached the remote chain tip and drained every worker.
    Synced,
}

impl SyncState {
    /// Check if a transition to the target state is valid.
    pub fn can_transition_to(&self, target: SyncState) -> bool {
        match self {
            SyncState::Idle => matches!(target, SyncState::Syncing),
            SyncState::Syncing => matches!(target, SyncState::Synced | SyncState::Idle),
            SyncState::Synced => matches!(target, SyncState::Syncing | SyncState::Idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_status_transitions() {
        assert!(FetchStatus::Unscheduled.can_transition_to(FetchStatus::Running));
        assert!(FetchStatus::Running.can_transition_to(FetchStatus::Completed));
        assert!(FetchStatus::Running.can_transition_to(FetchStatus::Failed));
        assert!(!FetchStatus::Unscheduled.can_transition_to(FetchStatus::Completed));
        assert!(!FetchStatus::Completed.can_transition_to(FetchStatus::Failed));
        assert!(!FetchStatus::Failed.can_transition_to(FetchStatus::Running));
    }

    #[test]
    fn test_sync_state_transitions() {
        assert!(SyncState::Idle.can_transition_to(SyncState::Syncing));
        assert!(!SyncState::Idle.can_transition_to(SyncState::Synced));
        assert!(SyncState::Syncing.can_transition_to(SyncState::Synced));
        assert!(SyncState::Synced.can_transition_to(SyncState::Syncing));
    }
}
