//! Command line options.

use crate::config::{Config, DemoConfig, PoolSize, WaitMode};
use crate::error::Result;
use crate::executor::FailurePolicy;
use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Raw-thread and worker-pool demos", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(long, value_name = "N", help = "Worker threads in the pool (default: one per CPU)")]
    threads: Option<usize>,

    #[arg(long, value_name = "N", default_value_t = 5, help = "Numbers each counter prints")]
    steps: u32,

    #[arg(long, value_name = "MS", default_value_t = 1000, help = "Pause after each number")]
    pause_ms: u64,

    #[arg(long, help = "Poll is_done() in a loop instead of blocking on all handles")]
    poll: bool,

    #[arg(long, value_name = "MS", default_value_t = 500, help = "First delay between polls")]
    poll_ms: u64,

    #[arg(
        long,
        value_name = "POLICY",
        default_value = "log",
        help = "What to do with task failures nobody retrieves: log or abort"
    )]
    on_unretrieved: FailurePolicy,

    #[arg(long, help = "Run in verbose mode")]
    verbose: bool,

    #[arg(long, help = "Run in debug mode")]
    debug: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Two counters on raw OS threads
    Threads,
    /// Two counters submitted to a worker pool, waited on through handles
    Pool,
}

impl Cli {
    /// Subcommands to run, in order. Both when none was given.
    pub fn commands(&self) -> Vec<Command> {
        match self.command {
            Some(command) => vec![command],
            None => vec![Command::Threads, Command::Pool],
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn pool_config(&self) -> Result<Config> {
        let pool_size = match self.threads {
            Some(n) => PoolSize::Fixed(n),
            None => PoolSize::Available,
        };

        Config::builder()
            .pool_size(pool_size)
            .failure_policy(self.on_unretrieved)
            .build()
    }

    pub fn demo_config(&self) -> Result<DemoConfig> {
        let demo = DemoConfig {
            steps: self.steps,
            pause: Duration::from_millis(self.pause_ms),
            poll_interval: Duration::from_millis(self.poll_ms),
            wait_mode: if self.poll { WaitMode::Poll } else { WaitMode::Join },
        };
        demo.validate()?;
        Ok(demo)
    }
}
