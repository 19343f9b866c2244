use super::task::TaskId;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What to do with a task failure nobody is going to retrieve.
///
/// A failure is unretrieved when its handle is dropped without calling `get`,
/// or when the task was submitted with `execute` and never had a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Log,
    Abort,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(FailurePolicy::Log),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

#[derive(Debug)]
pub struct PanicHandler {
    policy: FailurePolicy,
    panic_count: AtomicUsize,
    unretrieved_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            panic_count: AtomicUsize::new(0),
            unretrieved_count: AtomicUsize::new(0),
        }
    }

    /// Run `f`, turning a panic into a [`PanicInfo`].
    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);
                Err(PanicInfo::from_payload(payload))
            }
        }
    }

    /// Surface a failure whose outcome will never be read.
    pub fn report_unretrieved(&self, id: TaskId, message: &str) {
        self.unretrieved_count.fetch_add(1, Ordering::Relaxed);

        match self.policy {
            FailurePolicy::Log => {
                tracing::error!(task = %id, "unretrieved task failure: {}", message);
            }
            FailurePolicy::Abort => {
                tracing::error!(task = %id, "unretrieved task failure, aborting: {}", message);
                std::process::abort();
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn unretrieved_count(&self) -> usize {
        self.unretrieved_count.load(Ordering::Relaxed)
    }

}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(FailurePolicy::default())
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}
