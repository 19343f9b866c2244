use crate::executor::TaskId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("executor error: {0}")]
    Executor(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("worker pool is shut down")]
    PoolShutdown,

    #[error("runtime not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("task {id} failed: {message}")]
    TaskFailed { id: TaskId, message: String },

    #[error("task {0} was cancelled")]
    Cancelled(TaskId),

    /// A pause was cut short by a cancellation request.
    #[error("interrupted")]
    Interrupted,

    #[error("timed out waiting for task")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn task_failed<S: Into<String>>(id: TaskId, msg: S) -> Self {
        Error::TaskFailed {
            id,
            message: msg.into(),
        }
    }

    /// True for outcomes that mean "the task did not run to completion on
    /// purpose" rather than "the task broke".
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled(_) | Error::Interrupted)
    }
}
