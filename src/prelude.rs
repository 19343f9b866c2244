pub use crate::config::{Config, ConfigBuilder, PoolSize};
pub use crate::error::{Error, Result};
pub use crate::executor::{
    join_all, poll_until_done, CancelToken, FailurePolicy, TaskHandle, TaskStatus, WorkerPool,
};
pub use crate::util::PollBackoff;

pub use crate::{init, init_with_config, shutdown};
