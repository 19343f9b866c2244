use crate::error::{Error, Result};
use crate::executor::FailurePolicy;
use std::time::Duration;

/// How many worker threads a pool starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSize {
    Fixed(usize),
    SingleThread,
    /// One worker per logical CPU.
    Available,
}

impl Default for PoolSize {
    fn default() -> Self {
        PoolSize::Available
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pool_size: PoolSize,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    pub failure_policy: FailurePolicy,
    pub keep_alive: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: PoolSize::default(),
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "tandem-worker".to_string(),
            failure_policy: FailurePolicy::default(),
            keep_alive: Duration::from_micros(100),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let PoolSize::Fixed(n) = self.pool_size {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        if self.keep_alive.is_zero() {
            return Err(Error::config("keep_alive must be > 0"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        match self.pool_size {
            PoolSize::Fixed(n) => n,
            PoolSize::SingleThread => 1,
            PoolSize::Available => num_cpus::get().max(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.pool_size = PoolSize::Fixed(n);
        self
    }

    pub fn pool_size(mut self, size: PoolSize) -> Self {
        self.config.pool_size = size;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// How the pool demo waits for its two handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Block on `join_all` until every handle resolves.
    Join,
    /// Query `is_done()` in a loop, sleeping between checks.
    Poll,
}

/// Parameters shared by both demos.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub steps: u32,
    pub pause: Duration,
    pub poll_interval: Duration,
    pub wait_mode: WaitMode,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            steps: 5,
            pause: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(500),
            wait_mode: WaitMode::Join,
        }
    }
}

impl DemoConfig {
    pub const MAX_STEPS: u32 = u32::MAX / 2;

    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            return Err(Error::config("steps must be > 0"));
        }
        // the second pool counter runs over steps..steps * 2
        if self.steps > Self::MAX_STEPS {
            return Err(Error::config(format!("steps must be <= {}", Self::MAX_STEPS)));
        }
        if self.wait_mode == WaitMode::Poll && self.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be > 0"));
        }
        Ok(())
    }
}
