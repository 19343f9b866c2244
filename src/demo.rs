//! The two demonstration programs.
//!
//! [`run_raw_threads`] starts two counters on their own OS threads.
//! [`run_pool_futures`] submits two counters to a [`WorkerPool`], waits for
//! both handles and prints what each one resolved to.

use crate::config::{Config, DemoConfig, WaitMode};
use crate::error::{Error, Result};
use crate::executor::{join_all, poll_until_done, CancelToken, WorkerPool};
use crate::util::PollBackoff;
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::ops::Range;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const FIRST_DONE: &str = "I am Jean, I'm done";
pub const SECOND_DONE: &str = "I am Marie, I'm done too";
pub const WAITING: &str = "waiting...";

/// Where demo output goes. Lines are written whole, so concurrent counters
/// interleave by line and never mid-line.
#[derive(Clone)]
pub enum Sink {
    Stdout,
    Memory(Arc<Mutex<Vec<String>>>),
}

impl Sink {
    pub fn memory() -> Self {
        Sink::Memory(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn line<D: fmt::Display>(&self, value: D) {
        match self {
            Sink::Stdout => {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                if let Err(e) = writeln!(out, "{}", value) {
                    tracing::warn!("failed to write to stdout: {}", e);
                }
            }
            Sink::Memory(lines) => lines.lock().push(value.to_string()),
        }
    }

    /// Everything written so far. Always empty for stdout.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Sink::Stdout => Vec::new(),
            Sink::Memory(lines) => lines.lock().clone(),
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Stdout => f.write_str("Sink::Stdout"),
            Sink::Memory(lines) => write!(f, "Sink::Memory({} lines)", lines.lock().len()),
        }
    }
}

/// Emit every number in `range`, pausing after each one.
pub fn count(range: Range<u32>, pause: Duration, token: &CancelToken, sink: &Sink) -> Result<()> {
    for i in range {
        sink.line(i);
        token.sleep(pause)?;
    }
    Ok(())
}

/// Run [`count`] on a new named thread.
pub fn spawn_counter(
    name: &str,
    range: Range<u32>,
    pause: Duration,
    token: CancelToken,
    sink: Sink,
) -> Result<JoinHandle<Result<()>>> {
    let thread_name = name.to_string();

    let handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
        let result = count(range, pause, &token, &sink);
        if let Err(e) = &result {
            tracing::warn!(thread = %thread_name, "counter stopped early: {}", e);
        }
        result
    })?;

    Ok(handle)
}

/// Two counters over the same range, each on its own thread. Returns once
/// both finished; the first error (including an interruption) wins.
pub fn run_raw_threads(demo: &DemoConfig, token: &CancelToken, sink: &Sink) -> Result<()> {
    demo.validate()?;

    let handles = ["counter-1", "counter-2"]
        .into_iter()
        .map(|name| spawn_counter(name, 0..demo.steps, demo.pause, token.clone(), sink.clone()))
        .collect::<Result<Vec<_>>>()?;

    let mut first_err = None;
    for handle in handles {
        let result = handle
            .join()
            .map_err(|_| Error::executor("counter thread panicked"))
            .and_then(|r| r);
        if let Err(e) = result {
            first_err.get_or_insert(e);
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Submit two counters to a fresh pool, wait for both, print their results and
/// shut the pool down. Returns the two result strings in submission order.
pub fn run_pool_futures(pool_config: &Config, demo: &DemoConfig, sink: &Sink) -> Result<Vec<String>> {
    demo.validate()?;

    let pool = WorkerPool::new(pool_config)?;
    let steps = demo.steps;

    let jobs = [(0..steps, FIRST_DONE), (steps..steps * 2, SECOND_DONE)];
    let mut handles = Vec::with_capacity(jobs.len());
    for (range, message) in jobs {
        let pause = demo.pause;
        let sink = sink.clone();
        handles.push(pool.submit_cancellable(move |token| {
            count(range, pause, token, &sink)?;
            Ok(message.to_string())
        })?);
    }

    if demo.wait_mode == WaitMode::Poll {
        let mut backoff = PollBackoff::new(demo.poll_interval, demo.poll_interval.saturating_mul(4));
        let rounds = poll_until_done(&handles, &mut backoff, || sink.line(WAITING));
        tracing::debug!(rounds, "all handles done after polling");
    }

    let results = join_all(handles)
        .into_iter()
        .collect::<Result<Vec<_>>>();

    pool.shutdown();
    let terminated = pool.await_termination(Duration::from_secs(5));
    tracing::debug!(terminated, stats = ?pool.stats(), "pool demo finished");

    let results = results?;
    for message in &results {
        sink.line(message);
    }
    Ok(results)
}
