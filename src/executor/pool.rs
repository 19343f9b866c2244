use super::cancel::CancelToken;
use super::handle::{self, TaskHandle};
use super::panic_handler::{FailurePolicy, PanicHandler};
use super::stats::{Counters, PoolStats};
use super::task::{Task, TaskId};
use super::worker::{Worker, WorkerId, WorkerState};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::util::deadline;
use crossbeam_deque::{Injector, Steal};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// State shared between the pool, its workers and every task it created.
pub(crate) struct PoolShared {
    pub(crate) panic_handler: PanicHandler,
    pub(crate) counters: Counters,
    pub(crate) keep_alive: Duration,
    running: Mutex<HashMap<TaskId, CancelToken>>,
    shutdown: AtomicBool,
    discard: AtomicBool,
    live_workers: Mutex<usize>,
    terminated: Condvar,
}

impl PoolShared {
    pub(crate) fn new(policy: FailurePolicy) -> Self {
        Self {
            panic_handler: PanicHandler::new(policy),
            counters: Counters::default(),
            keep_alive: Config::default().keep_alive,
            running: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
            discard: AtomicBool::new(false),
            live_workers: Mutex::new(0),
            terminated: Condvar::new(),
        }
    }

    fn from_config(config: &Config) -> Self {
        Self {
            keep_alive: config.keep_alive,
            ..Self::new(config.failure_policy)
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn is_discarding(&self) -> bool {
        self.discard.load(Ordering::Acquire)
    }

    pub(crate) fn register_running(&self, id: TaskId, token: CancelToken) {
        self.running.lock().insert(id, token);
    }

    pub(crate) fn unregister_running(&self, id: TaskId) {
        self.running.lock().remove(&id);
    }

    pub(crate) fn worker_exited(&self) {
        let mut live = self.live_workers.lock();
        *live = live.saturating_sub(1);
        if *live == 0 {
            self.terminated.notify_all();
        }
    }
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

/// A fixed set of worker threads executing submitted tasks.
///
/// Workers pull from a shared injector queue and steal from each other when
/// idle. Every submission returns a [`TaskHandle`] (or, for
/// [`execute`](Self::execute), nothing) and never blocks.
pub struct WorkerPool {
    workers: Mutex<Vec<WorkerHandle>>,
    unparkers: Vec<thread::Thread>,
    worker_states: Vec<Arc<WorkerState>>,
    injector: Arc<Injector<Task>>,
    shared: Arc<PoolShared>,
    // Held for reading while a task is pushed, so no push can slip in after
    // workers start draining for shutdown.
    accepting: RwLock<bool>,
    num_threads: usize,
    next_wake: AtomicUsize,
}

impl WorkerPool {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        let injector = Arc::new(Injector::new());
        let shared = Arc::new(PoolShared::from_config(config));

        let workers: Vec<Worker> = (0..num_threads).map(Worker::new).collect();
        let stealers: Vec<_> = workers.iter().map(|w| w.local_queue.stealer()).collect();
        let worker_states: Vec<_> = workers.iter().map(|w| w.state.clone()).collect();

        let mut handles = Vec::with_capacity(num_threads);
        let mut unparkers = Vec::with_capacity(num_threads);

        for worker in workers {
            let id = worker.id;
            let stealers_clone = stealers.clone();
            let injector_clone = injector.clone();
            let shared_clone = shared.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            *shared.live_workers.lock() += 1;

            let spawned = builder.spawn(move || {
                worker.run(stealers_clone, injector_clone, shared_clone);
            });

            match spawned {
                Ok(thread) => {
                    unparkers.push(thread.thread().clone());
                    handles.push(WorkerHandle {
                        id,
                        thread: Some(thread),
                    });
                }
                Err(e) => {
                    shared.worker_exited();
                    shared.shutdown.store(true, Ordering::Release);
                    for unparker in &unparkers {
                        unparker.unpark();
                    }
                    for handle in handles {
                        if let Some(thread) = handle.thread {
                            let _ = thread.join();
                        }
                    }
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            }
        }

        tracing::debug!(
            threads = num_threads,
            policy = ?config.failure_policy,
            "worker pool started"
        );

        Ok(Self {
            workers: Mutex::new(handles),
            unparkers,
            worker_states,
            injector,
            shared,
            accepting: RwLock::new(true),
            num_threads,
            next_wake: AtomicUsize::new(0),
        })
    }

    /// Submit `work` and bind its handle to `value`, which becomes retrievable
    /// once `work` returns.
    pub fn submit<T, F>(&self, work: F, value: T) -> Result<TaskHandle<T>>
    where
        F: FnOnce() + Send + 'static,
        T: Send + 'static,
    {
        self.submit_cancellable(move |_| {
            work();
            Ok(value)
        })
    }

    /// Submit a closure whose return value is the task's result.
    pub fn submit_call<T, F>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_cancellable(move |_| Ok(f()))
    }

    /// Submit a closure that can observe cancellation through its token.
    ///
    /// Returning `Err(Error::Interrupted)` resolves the handle as cancelled;
    /// any other error resolves it as failed.
    pub fn submit_cancellable<T, F>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let accepting = self.accepting.read();
        if !*accepting {
            return Err(Error::PoolShutdown);
        }

        let (completer, handle) = handle::pair(self.shared.clone());
        self.shared.counters.record_submitted();
        self.injector
            .push(Task::with_id(handle.id(), move || completer.run(f)));
        drop(accepting);

        self.wake_one();
        Ok(handle)
    }

    /// Fire and forget. A failure is reported through the pool's
    /// [`FailurePolicy`] since no handle exists to retrieve it.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_call(f).map(drop)
    }

    fn wake_one(&self) {
        if self.unparkers.is_empty() {
            return;
        }
        let idx = self.next_wake.fetch_add(1, Ordering::Relaxed) % self.unparkers.len();
        self.unparkers[idx].unpark();
    }

    fn wake_all(&self) {
        // wake everyone up to check shutdown flag
        for unparker in &self.unparkers {
            unparker.unpark();
        }
    }

    /// Stop accepting work. Queued and running tasks still finish, then the
    /// workers exit. Does not block; calling it again has no effect.
    pub fn shutdown(&self) {
        {
            let mut accepting = self.accepting.write();
            if !*accepting {
                return;
            }
            *accepting = false;
        }

        self.shared.shutdown.store(true, Ordering::Release);
        self.wake_all();
        tracing::debug!("worker pool shutting down");
    }

    /// Stop accepting work and drop everything still queued; those handles
    /// resolve as cancelled. Running tasks get their tokens signalled.
    pub fn shutdown_now(&self) {
        *self.accepting.write() = false;

        if self.shared.discard.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.shutdown.store(true, Ordering::Release);

        let mut discarded = 0usize;
        loop {
            match self.injector.steal() {
                Steal::Success(task) => {
                    drop(task);
                    discarded += 1;
                }
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        for token in self.shared.running.lock().values() {
            token.cancel();
        }

        self.wake_all();
        tracing::debug!(discarded, "worker pool shut down immediately");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Wait until every worker has exited. Returns false on timeout.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = deadline::deadline_after(timeout);
        let mut live = self.shared.live_workers.lock();
        while *live > 0 {
            if deadline::wait_until(&self.shared.terminated, &mut live, deadline) {
                break;
            }
        }
        *live == 0
    }

    /// Shut down and join every worker thread.
    pub fn join(&self) {
        self.shutdown();

        let current = thread::current().id();
        let mut workers = self.workers.lock();
        for worker in workers.iter_mut() {
            // a task dropping the last reference to its own pool can't join itself
            if worker.thread.as_ref().map(|t| t.thread().id()) == Some(current) {
                continue;
            }
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::error!(worker = worker.id, "worker thread panicked");
                }
            }
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn pending_tasks(&self) -> u64 {
        self.stats().pending()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            unretrieved: self.shared.panic_handler.unretrieved_count() as u64,
            panicked: self.shared.panic_handler.panic_count() as u64,
            stolen: self
                .worker_states
                .iter()
                .map(|state| state.tasks_stolen.load(Ordering::Relaxed))
                .sum(),
            ..self.shared.counters.snapshot()
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("shutdown", &self.is_shutdown())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn pool(threads: usize) -> WorkerPool {
        let config = Config::builder().num_threads(threads).build().unwrap();
        WorkerPool::new(&config).unwrap()
    }

    #[test]
    fn test_submit_returns_bound_value() {
        let pool = pool(2);
        let handle = pool.submit(|| {}, "done").unwrap();
        assert_eq!(handle.get().unwrap(), "done");
    }

    #[test]
    fn test_submit_call() {
        let pool = pool(2);
        let handle = pool.submit_call(|| 6 * 7).unwrap();
        assert_eq!(handle.get().unwrap(), 42);
    }

    #[test]
    fn test_execute_runs() {
        let pool = pool(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.join();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = pool(1);
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(matches!(pool.submit_call(|| 1), Err(Error::PoolShutdown)));
        assert!(matches!(pool.execute(|| {}), Err(Error::PoolShutdown)));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = pool(2);
        pool.shutdown();
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        pool.shutdown_now();
        pool.join();
    }

    #[test]
    fn test_await_termination_without_deadline() {
        let pool = pool(2);
        pool.shutdown();
        assert!(pool.await_termination(Duration::MAX));
    }

    #[test]
    fn test_shutdown_drains_queued_tasks() {
        let pool = pool(1);
        let handles: Vec<_> = (0..20)
            .map(|i| {
                pool.submit_call(move || {
                    thread::sleep(Duration::from_millis(1));
                    i
                })
                .unwrap()
            })
            .collect();

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(10)));

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.get().unwrap(), i);
        }
        assert_eq!(pool.stats().completed, 20);
    }

    #[test]
    fn test_shutdown_right_after_submit_runs_task() {
        for _ in 0..200 {
            let pool = pool(4);
            let handle = pool.submit_call(|| 11).unwrap();
            pool.shutdown();

            assert!(pool.await_termination(Duration::from_secs(5)));
            assert_eq!(handle.get_timeout(Duration::from_secs(5)).unwrap(), 11);
            assert_eq!(pool.stats().pending(), 0);
        }
    }

    #[test]
    fn test_shutdown_now_cancels_queued() {
        let pool = pool(1);
        let (started_tx, started_rx) = std::sync::mpsc::channel();

        let blocker = pool
            .submit_cancellable(move |token| {
                started_tx.send(()).unwrap();
                token.sleep(Duration::from_secs(30))?;
                Ok(0)
            })
            .unwrap();
        started_rx.recv().unwrap();

        let queued: Vec<_> = (0..5).map(|i| pool.submit_call(move || i).unwrap()).collect();

        pool.shutdown_now();
        assert!(pool.await_termination(Duration::from_secs(10)));

        assert!(matches!(blocker.get(), Err(Error::Cancelled(_))));
        for handle in queued {
            assert!(handle.is_done());
            assert!(matches!(handle.get(), Err(Error::Cancelled(_))));
        }

        let stats = pool.stats();
        assert_eq!(stats.cancelled, 6);
        assert_eq!(stats.pending(), 0);
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let pool = pool(1);

        let bad = pool.submit_call(|| -> u32 { panic!("task exploded") }).unwrap();
        let good = pool.submit_call(|| 1u32).unwrap();

        assert!(matches!(bad.get(), Err(Error::TaskFailed { .. })));
        assert_eq!(good.get().unwrap(), 1);

        let stats = pool.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.panicked, 1);
    }

    #[test]
    fn test_unretrieved_failure_counted() {
        let pool = pool(1);
        pool.execute(|| panic!("fire and forget")).unwrap();
        pool.join();
        assert_eq!(pool.stats().unretrieved, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            pool_size: crate::config::PoolSize::Fixed(0),
            ..Config::default()
        };
        assert!(matches!(WorkerPool::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_returned_error_is_not_a_panic() {
        let pool = pool(1);
        let handle = pool
            .submit_cancellable(|_| -> Result<u32> { Err(Error::executor("no")) })
            .unwrap();
        assert!(handle.get().is_err());

        let stats = pool.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.panicked, 0);
    }

    #[test]
    fn test_num_threads() {
        let pool = pool(3);
        assert_eq!(pool.num_threads(), 3);
    }
}
