//! Conflict retry loop for atomic units
//!
//! A unit that loses an optimistic-concurrency race is re-run from scratch
//! after a backoff delay. Only `TransactionAborted` is retried; every other
//! error returns immediately. The loop blocks the calling thread.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use termdex_core::Result;
use tracing::{error, warn};

use crate::config::RetryConfig;

/// Blocks the current thread between retries
pub trait Sleeper: Send + Sync {
    /// Wait for `delay`
    fn sleep(&self, delay: Duration);
}

/// `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Records requested delays without waiting
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Create a new recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.delays.lock().push(delay);
    }
}

/// Retry configuration plus the sleeper used to wait
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Policy that sleeps the calling thread
    pub fn new(config: RetryConfig) -> Self {
        Self::with_sleeper(config, Arc::new(ThreadSleeper))
    }

    /// Policy with a custom sleeper
    pub fn with_sleeper(config: RetryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        RetryPolicy { config, sleeper }
    }

    /// The retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails with a non-conflict error, or the
    /// retry budget is spent
    ///
    /// `unit` names the work in log lines (usually the term being written).
    pub fn run<T>(&self, unit: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_conflict() && attempt < self.config.max_retries => {
                    let delay = self.config.calculate_delay(attempt);
                    warn!(
                        target: "termdex::txn",
                        unit,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transaction collision, retrying"
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_conflict() {
                        error!(
                            target: "termdex::txn",
                            unit,
                            attempts = attempt + 1,
                            "Retry budget exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
