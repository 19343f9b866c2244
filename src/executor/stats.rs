use super::handle::TaskStatus;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a pool's task counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Failures whose handle was dropped without `get`.
    pub unretrieved: u64,
    /// Tasks that failed by panicking, a subset of `failed`.
    pub panicked: u64,
    /// Tasks a worker took from a sibling's queue.
    pub stolen: u64,
}

impl PoolStats {
    /// Tasks submitted but not yet resolved.
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.failed + self.cancelled)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, status: TaskStatus) {
        let counter = match status {
            TaskStatus::Completed => &self.completed,
            TaskStatus::Failed => &self.failed,
            TaskStatus::Cancelled => &self.cancelled,
            TaskStatus::Pending | TaskStatus::Running => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            ..PoolStats::default()
        }
    }
}
