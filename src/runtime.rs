//! Process-wide worker pool.
//!
//! Most callers build a [`WorkerPool`] directly. The global runtime exists for
//! code that wants one pool per process, created once and shut down once.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{TaskHandle, WorkerPool};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug)]
pub struct Runtime {
    pub(crate) pool: WorkerPool,
    config: Config,
}

impl Runtime {
    pub fn new(config: Config) -> Result<Self> {
        let pool = WorkerPool::new(&config)?;
        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

// Global runtime for simple API
static GLOBAL_RUNTIME: RwLock<Option<Arc<Runtime>>> = RwLock::new(None);

pub fn init() -> Result<()> {
    init_with_config(Config::default())
}

pub fn init_with_config(config: Config) -> Result<()> {
    let mut runtime = GLOBAL_RUNTIME.write();

    if runtime.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    *runtime = Some(Arc::new(Runtime::new(config)?));
    Ok(())
}

pub fn is_initialized() -> bool {
    GLOBAL_RUNTIME.read().is_some()
}

pub(crate) fn current_runtime() -> Result<Arc<Runtime>> {
    GLOBAL_RUNTIME.read().clone().ok_or(Error::NotInitialized)
}

/// Submit to the global pool. See [`WorkerPool::submit`].
pub fn submit<T, F>(work: F, value: T) -> Result<TaskHandle<T>>
where
    F: FnOnce() + Send + 'static,
    T: Send + 'static,
{
    current_runtime()?.pool.submit(work, value)
}

/// Submit to the global pool. See [`WorkerPool::submit_call`].
pub fn submit_call<T, F>(f: F) -> Result<TaskHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    current_runtime()?.pool.submit_call(f)
}

/// Tear down the global pool, letting queued tasks finish. Safe to call when
/// nothing was initialized.
pub fn shutdown() {
    let runtime = GLOBAL_RUNTIME.write().take();

    if let Some(rt) = runtime {
        rt.pool.join();
    }
}
