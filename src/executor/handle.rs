//! Future handles for submitted tasks.
//!
//! Submitting work splits it into two halves sharing one task state: a
//! `Completer` that travels with the closure onto a worker and a
//! [`TaskHandle`] that stays with the submitter. The completer writes the
//! outcome exactly once; the handle observes it.
//!
//! Status only moves forward:
//!
//! ```text
//! Pending -> Running -> Completed | Failed | Cancelled
//! Pending -> Cancelled
//! ```

use super::cancel::CancelToken;
use super::panic_handler::PanicInfo;
use super::pool::PoolShared;
use super::task::TaskId;
use crate::error::{Error, Result};
use crate::util::{deadline, PollBackoff};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const FAILED: u8 = 3;
const CANCELLED: u8 = 4;

/// Lifecycle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            PENDING => TaskStatus::Pending,
            RUNNING => TaskStatus::Running,
            COMPLETED => TaskStatus::Completed,
            FAILED => TaskStatus::Failed,
            _ => TaskStatus::Cancelled,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TaskStatus::Pending => PENDING,
            TaskStatus::Running => RUNNING,
            TaskStatus::Completed => COMPLETED,
            TaskStatus::Failed => FAILED,
            TaskStatus::Cancelled => CANCELLED,
        }
    }

    /// Completed, failed or cancelled.
    pub fn is_terminal(self) -> bool {
        self.as_u8() >= COMPLETED
    }
}

struct TaskState<T> {
    id: TaskId,
    status: AtomicU8,
    // `None` until resolved, and again once `get` took the value.
    outcome: Mutex<Option<Result<T>>>,
    done: Condvar,
    token: CancelToken,
    cancel_requested: AtomicBool,
    shared: Arc<PoolShared>,
}

impl<T> TaskState<T> {
    fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn cancel_pending(&self) -> bool {
        let mut slot = self.outcome.lock();
        let swapped = self
            .status
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            self.shared.counters.record_outcome(TaskStatus::Cancelled);
            *slot = Some(Err(Error::Cancelled(self.id)));
            self.done.notify_all();
        }
        swapped
    }

    fn request_cancel(&self) -> bool {
        let _slot = self.outcome.lock();
        if self.status.load(Ordering::Acquire) != RUNNING {
            return false;
        }
        self.cancel_requested.store(true, Ordering::Release);
        self.token.cancel();
        true
    }

    fn finish(&self, result: std::result::Result<Result<T>, PanicInfo>) -> TaskStatus {
        let mut slot = self.outcome.lock();

        let (status, outcome) = match result {
            Err(panic) => {
                tracing::debug!(task = %self.id, "task panicked: {}", panic.message);
                (
                    TaskStatus::Failed,
                    Err(Error::task_failed(self.id, panic.message)),
                )
            }
            Ok(_) if self.cancel_requested.load(Ordering::Acquire) => {
                (TaskStatus::Cancelled, Err(Error::Cancelled(self.id)))
            }
            Ok(Ok(value)) => (TaskStatus::Completed, Ok(value)),
            Ok(Err(e)) if e.is_cancellation() => {
                (TaskStatus::Cancelled, Err(Error::Cancelled(self.id)))
            }
            Ok(Err(e)) => {
                tracing::debug!(task = %self.id, "task returned an error: {}", e);
                (
                    TaskStatus::Failed,
                    Err(Error::task_failed(self.id, e.to_string())),
                )
            }
        };

        // counted before anyone can observe the outcome
        self.shared.counters.record_outcome(status);
        *slot = Some(outcome);
        self.status.store(status.as_u8(), Ordering::Release);
        self.done.notify_all();
        status
    }
}

impl<T> Drop for TaskState<T> {
    fn drop(&mut self) {
        if let Some(Err(Error::TaskFailed { id, message })) = self.outcome.get_mut() {
            self.shared.panic_handler.report_unretrieved(*id, message);
        }
    }
}

/// Create the two halves of a task sharing one state.
pub(crate) fn pair<T>(shared: Arc<PoolShared>) -> (Completer<T>, TaskHandle<T>) {
    let state = Arc::new(TaskState {
        id: TaskId::next(),
        status: AtomicU8::new(PENDING),
        outcome: Mutex::new(None),
        done: Condvar::new(),
        token: CancelToken::new(),
        cancel_requested: AtomicBool::new(false),
        shared,
    });

    (
        Completer {
            state: Some(state.clone()),
        },
        TaskHandle { state },
    )
}

/// Worker-side half of a task.
///
/// Dropping a completer that never ran resolves its handle as cancelled, so a
/// discarded task never leaves a handle blocked forever.
pub(crate) struct Completer<T> {
    state: Option<Arc<TaskState<T>>>,
}

impl<T> Completer<T> {
    pub fn run<F>(mut self, f: F)
    where
        F: FnOnce(&CancelToken) -> Result<T>,
    {
        let Some(state) = self.state.take() else {
            return;
        };
        let shared = state.shared.clone();

        let started = state
            .status
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !started {
            tracing::trace!(task = %state.id, "skipping task cancelled before start");
            return;
        }

        shared.register_running(state.id, state.token.clone());
        let result = shared.panic_handler.execute(|| f(&state.token));
        shared.unregister_running(state.id);

        let status = state.finish(result);
        tracing::trace!(task = %state.id, ?status, "task finished");
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.cancel_pending();
        }
    }
}

/// Handle to the eventual outcome of a submitted task.
pub struct TaskHandle<T> {
    state: Arc<TaskState<T>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.state.id
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    /// Non-blocking. Once true, stays true.
    pub fn is_done(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::Cancelled
    }

    /// Block until the task resolves and return its outcome.
    ///
    /// Returns the bound value on success, [`Error::TaskFailed`] if the task
    /// panicked or returned an error, and [`Error::Cancelled`] if it was
    /// cancelled.
    pub fn get(self) -> Result<T> {
        let mut slot = self.state.outcome.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            self.state.done.wait(&mut slot);
        }
    }

    /// Like [`get`](Self::get), giving up with [`Error::Timeout`] after `timeout`.
    pub fn get_timeout(self, timeout: Duration) -> Result<T> {
        let deadline = deadline::deadline_after(timeout);
        let mut slot = self.state.outcome.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            if deadline::wait_until(&self.state.done, &mut slot, deadline) && slot.is_none() {
                return Err(Error::Timeout);
            }
        }
    }

    /// Wait up to `timeout` for the task to resolve. Returns [`is_done`](Self::is_done).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = deadline::deadline_after(timeout);
        let mut slot = self.state.outcome.lock();
        while slot.is_none() {
            if deadline::wait_until(&self.state.done, &mut slot, deadline) {
                break;
            }
        }
        drop(slot);
        self.is_done()
    }

    /// Cancel the task.
    ///
    /// A pending task will never run. A running task has its [`CancelToken`]
    /// signalled and resolves as cancelled when it returns. Returns false if
    /// the task had already finished.
    pub fn cancel(&self) -> bool {
        loop {
            match self.status() {
                TaskStatus::Pending => {
                    if self.state.cancel_pending() {
                        return true;
                    }
                }
                TaskStatus::Running => {
                    if self.state.request_cancel() {
                        return true;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.state.id)
            .field("status", &self.status())
            .finish()
    }
}

/// Block until every handle resolves; outcomes come back in input order.
pub fn join_all<T, I>(handles: I) -> Vec<Result<T>>
where
    I: IntoIterator<Item = TaskHandle<T>>,
{
    handles.into_iter().map(TaskHandle::get).collect()
}

/// Poll `is_done()` on every handle until all are done, calling `on_wait` and
/// backing off between rounds. Returns how many rounds had to wait.
pub fn poll_until_done<T, W>(handles: &[TaskHandle<T>], backoff: &mut PollBackoff, mut on_wait: W) -> usize
where
    W: FnMut(),
{
    let mut rounds = 0;
    while !handles.iter().all(TaskHandle::is_done) {
        on_wait();
        backoff.snooze();
        rounds += 1;
    }
    backoff.reset();
    rounds
}
