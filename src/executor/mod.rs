//! Task execution infrastructure.
//!
//! This module provides the worker pool, the future handles returned by
//! submission, and the cancellation token tasks can observe.

pub mod cancel;
pub mod handle;
pub mod panic_handler;
pub mod pool;
pub mod stats;
pub mod task;
pub mod worker;

pub use cancel::CancelToken;
pub use handle::{join_all, poll_until_done, TaskHandle, TaskStatus};
pub use panic_handler::{FailurePolicy, PanicHandler, PanicInfo};
pub use pool::WorkerPool;
pub use stats::PoolStats;
pub use task::TaskId;
