//! Task representation and execution.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value of the id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Internal task representation
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) func: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) spawn_time: Instant,
}

impl Task {
    /// Create a task whose id was already handed out to a handle
    pub fn with_id<F>(id: TaskId, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            id,
            func: Box::new(f),
            spawn_time: Instant::now(),
        }
    }

    /// Execute the task
    pub fn execute(self) {
        (self.func)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_task_ids_are_unique() {
        let a = TaskId::next();
        let b = TaskId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_task_executes_closure() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let task = Task::with_id(TaskId::next(), move || flag.store(true, Ordering::SeqCst));
        task.execute();
        assert!(ran.load(Ordering::SeqCst));
    }
}
