//! Cooperative cancellation.
//!
//! A [`CancelToken`] is shared between a task and whoever may want to stop it.
//! Setting it never preempts anything; the task notices either by checking
//! [`CancelToken::is_cancelled`] or because an interruptible
//! [`CancelToken::sleep`] returns [`Error::Interrupted`].

use crate::error::{Error, Result};
use crate::util::deadline;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every pause currently waiting on this token.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Fail fast if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Block for `duration` unless cancelled first. `Duration::MAX` sleeps
    /// until cancelled.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = deadline::deadline_after(duration);
        let mut cancelled = self.inner.cancelled.lock();

        while !*cancelled {
            if deadline::wait_until(&self.inner.cond, &mut cancelled, deadline) {
                break;
            }
        }

        if *cancelled {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_sleep_completes_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(token.sleep(Duration::from_millis(20)).is_ok());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let token = CancelToken::new();
        let sleeper = token.clone();

        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[test]
    fn test_sleep_after_cancel_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();

        let start = Instant::now();
        assert!(token.sleep(Duration::from_secs(30)).is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(token.check().is_err());
    }

    #[test]
    fn test_unbounded_sleep_ends_on_cancel() {
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(token.sleep(Duration::MAX), Err(Error::Interrupted)));

        let token = CancelToken::new();
        let sleeper = token.clone();
        let handle = thread::spawn(move || sleeper.sleep(Duration::MAX));
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(matches!(handle.join().unwrap(), Err(Error::Interrupted)));
    }
}
