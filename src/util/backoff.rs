//! Backoff strategies for loops that wait on another thread.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Spin, then yield, then park. Used by idle workers.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
    park_timeout: Duration,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;

    pub fn new(park_timeout: Duration) -> Self {
        Self {
            step: 0,
            park_timeout,
        }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Perform one step of backoff
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1 << self.step) {
                spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            // woken early by `unpark` when work arrives
            thread::park_timeout(self.park_timeout);
        }

        if self.step <= Self::YIELD_LIMIT {
            self.step += 1;
        }
    }
}

/// Sleeping backoff for polling loops: the delay starts at `initial` and
/// doubles on each round up to `max`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl PollBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Fixed interval, no growth.
    pub fn fixed(interval: Duration) -> Self {
        Self::new(interval, interval)
    }

    /// Delay the next `snooze` will sleep for.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn snooze(&mut self) {
        thread::sleep(self.current);
        self.current = self.current.saturating_mul(2).min(self.max);
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
