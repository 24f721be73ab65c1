//! Engine configuration via `termdex.toml`
//!
//! On first use, a commented default `termdex.toml` is written to the given
//! directory. To change settings, edit the file and rebuild the engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use termdex_core::{Error, Result};

/// Config file name placed in the configuration directory.
pub const CONFIG_FILE_NAME: &str = "termdex.toml";

/// Queue used for deferred indexing when none is configured.
pub const DEFAULT_QUEUE: &str = "default";

// ============================================================================
// Retry Configuration
// ============================================================================

/// Delay growth between retries of one atomic unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Always wait `base_delay_ms`
    #[default]
    Fixed,
    /// Double the delay each attempt, capped at `max_delay_ms`
    Exponential,
}

/// Retry behavior for atomic units that hit an optimistic-concurrency
/// conflict
///
/// The default waits one second between attempts and gives up after
/// 10 000 retries, which in practice only trips on a wedged store.
///
/// # Example
/// ```ignore
/// let retry = RetryConfig::new()
///     .with_backoff(Backoff::Exponential)
///     .with_base_delay_ms(5)
///     .with_max_delay_ms(200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// How the delay grows between attempts
    #[serde(default)]
    pub backoff: Backoff,
}

fn default_max_retries() -> usize {
    10_000
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryConfig {
    /// Create a RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RetryConfig with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Set the backoff strategy
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let delay_ms = match self.backoff {
            Backoff::Fixed => self.base_delay_ms,
            Backoff::Exponential => {
                // Cap the shift to prevent overflow (1 << 63 is the max for u64)
                let shift = attempt.min(63);
                self.base_delay_ms.saturating_mul(1u64 << shift)
            }
        };
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Engine configuration loaded from `termdex.toml`.
///
/// # Example
///
/// ```toml
/// queue_name = "indexing"
/// worker_threads = 2
///
/// [retry]
/// backoff = "exponential"
/// base_delay_ms = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Queue that deferred indexing jobs are scheduled on.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    /// Worker threads per background queue.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Jobs a background queue accepts before rejecting new ones.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
    /// Conflict retry policy for atomic units.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_queue_name() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_worker_threads() -> usize {
    1
}

fn default_max_queue_depth() -> usize {
    4096
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            worker_threads: default_worker_threads(),
            max_queue_depth: default_max_queue_depth(),
            retry: RetryConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Set the deferred indexing queue name
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty queue name, zero workers, zero
    /// queue depth, or a base delay above the maximum delay.
    pub fn validate(&self) -> Result<()> {
        if self.queue_name.trim().is_empty() {
            return Err(Error::Config("queue_name must not be empty".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be at least 1".to_string()));
        }
        if self.max_queue_depth == 0 {
            return Err(Error::Config("max_queue_depth must be at least 1".to_string()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# termdex configuration
#
# Queue that deferred (unindex then reindex) jobs are scheduled on.
queue_name = "default"

# Worker threads per background queue (default: 1).
worker_threads = 1

# Jobs a background queue holds before rejecting new ones (default: 4096).
max_queue_depth = 4096

# Retry policy for atomic units that collide with a concurrent writer.
[retry]
# "fixed" waits base_delay_ms every time; "exponential" doubles it per attempt.
backoff = "fixed"
base_delay_ms = 1000
max_delay_ms = 30000
max_retries = 10000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SearchConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Load `termdex.toml` from `dir`, creating the default file first if
    /// it is missing.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        Self::write_default_if_missing(&path)?;
        Self::from_file(&path)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
