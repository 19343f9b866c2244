//! tandem - a worker pool with future handles
//!
//! Submit closures to a [`WorkerPool`], get a [`TaskHandle`] back, and either
//! poll it with [`TaskHandle::is_done`] or block on [`TaskHandle::get`].
//!
//! # Quick Start
//!
//! ```no_run
//! use tandem::prelude::*;
//!
//! let config = Config::builder().num_threads(2).build().unwrap();
//! let pool = WorkerPool::new(&config).unwrap();
//!
//! let a = pool.submit(|| println!("working"), "A").unwrap();
//! let b = pool.submit_call(|| "B").unwrap();
//!
//! let results: Vec<_> = join_all([a, b]).into_iter().collect::<Result<_>>().unwrap();
//! assert_eq!(results, vec!["A", "B"]);
//!
//! pool.shutdown();
//! ```
//!
//! # Features
//!
//! - **Work-stealing pool**: workers share an injector queue and steal from each other
//! - **Future handles**: non-blocking `is_done`, blocking `get`, timeouts and `cancel`
//! - **Failure isolation**: a panicking task fails its own handle and nothing else
//! - **Unretrieved failures**: logged or fatal, per [`FailurePolicy`]
//! - **Cooperative cancellation**: interruptible pauses through [`CancelToken`]

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod executor;
pub mod log;
pub mod prelude;
pub mod runtime;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder, DemoConfig, PoolSize, WaitMode};
pub use error::{Error, Result};
pub use executor::{
    join_all, poll_until_done, CancelToken, FailurePolicy, PoolStats, TaskHandle, TaskId,
    TaskStatus, WorkerPool,
};
pub use runtime::{init, init_with_config, shutdown};
