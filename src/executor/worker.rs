// worker thread stuff
use super::pool::PoolShared;
use super::task::Task;
use crate::util::Backoff;
use crossbeam_deque::{Injector, Steal, Stealer, Worker as WorkerQueue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type WorkerId = usize;

// stats for each worker
#[derive(Debug, Default)]
pub struct WorkerState {
    pub tasks_executed: AtomicU64,
    pub tasks_stolen: AtomicU64,
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub local_queue: WorkerQueue<Task>,
    pub state: Arc<WorkerState>,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            local_queue: WorkerQueue::new_fifo(),
            state: Arc::new(WorkerState::default()),
        }
    }

    // main loop
    pub fn run(&self, stealers: Vec<Stealer<Task>>, injector: Arc<Injector<Task>>, shared: Arc<PoolShared>) {
        let _live = LiveGuard(shared.clone());
        let mut backoff = Backoff::new(shared.keep_alive);

        tracing::trace!(worker = self.id, "worker started");

        loop {
            if shared.is_discarding() {
                self.discard_local();
                break;
            }

            // Priority: local -> global -> steal
            if let Some(task) = self.find_task(&stealers, &injector) {
                backoff.reset();
                self.execute_task(task, &shared);
                continue;
            }

            // A push can land between the empty scan above and the flag being
            // set. Pushes happen before the flag, so one more scan sees them.
            if shared.is_shutdown() {
                match self.find_task(&stealers, &injector) {
                    Some(task) => {
                        self.execute_task(task, &shared);
                        continue;
                    }
                    None => break,
                }
            }

            backoff.snooze();
        }

        tracing::trace!(
            worker = self.id,
            executed = self.state.tasks_executed.load(Ordering::Relaxed),
            "worker exiting"
        );
    }

    fn find_task(&self, stealers: &[Stealer<Task>], injector: &Injector<Task>) -> Option<Task> {
        // 1. Check local queue first (best cache locality)
        if let Some(task) = self.local_queue.pop() {
            return Some(task);
        }

        // 2. Check global injector queue
        loop {
            match injector.steal_batch_and_pop(&self.local_queue) {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        // 3. Steal from other workers
        self.try_steal_from_workers(stealers)
    }

    fn try_steal_from_workers(&self, stealers: &[Stealer<Task>]) -> Option<Task> {
        use rand::seq::SliceRandom;
        use rand::thread_rng;

        if stealers.is_empty() {
            return None;
        }

        let mut indices: Vec<usize> = (0..stealers.len()).collect();
        indices.shuffle(&mut thread_rng());

        for &idx in &indices {
            if idx == self.id {
                continue;
            }

            loop {
                match stealers[idx].steal_batch_and_pop(&self.local_queue) {
                    Steal::Success(task) => {
                        self.state.tasks_stolen.fetch_add(1, Ordering::Relaxed);
                        return Some(task);
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }

    fn execute_task(&self, task: Task, shared: &PoolShared) {
        let tid = task.id;
        tracing::trace!(worker = self.id, task = %tid, queued_for = ?task.spawn_time.elapsed(), "running task");

        // Handles capture their own panics; this only fires if the task
        // wrapper itself unwinds.
        if let Err(panic) = shared.panic_handler.execute(|| task.execute()) {
            tracing::error!(worker = self.id, task = %tid, "task wrapper panicked: {}", panic.message);
        }

        self.state.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    fn discard_local(&self) {
        let mut discarded = 0usize;
        while let Some(task) = self.local_queue.pop() {
            // dropping the task resolves its handle as cancelled
            drop(task);
            discarded += 1;
        }
        if discarded > 0 {
            tracing::debug!(worker = self.id, discarded, "discarded queued tasks");
        }
    }
}

/// Keeps the pool's live-worker count accurate even if the loop unwinds.
struct LiveGuard(Arc<PoolShared>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}
