//! Condvar waits bounded by a timeout that may be too large to represent.

use parking_lot::{Condvar, MutexGuard};
use std::time::{Duration, Instant};

/// Deadline `timeout` from now, or `None` when it lies past what `Instant`
/// can hold. `None` means wait without a deadline.
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Wait on `cond` until notified or until `deadline` passes.
/// Returns true if the wait timed out.
pub(crate) fn wait_until<T>(cond: &Condvar, guard: &mut MutexGuard<'_, T>, deadline: Option<Instant>) -> bool {
    match deadline {
        Some(deadline) => cond.wait_until(guard, deadline).timed_out(),
        None => {
            cond.wait(guard);
            false
        }
    }
}
