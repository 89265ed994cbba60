//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    /// Queue name to default worker count. The persisted `<name>Runners`
    /// setting overrides the count at startup.
    #[serde(default = "default_queues")]
    pub queues: BTreeMap<String, usize>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            retry: RetryConfig::default(),
            worker: WorkerConfig::default(),
            queues: default_queues(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_queues() -> BTreeMap<String, usize> {
    BTreeMap::from([("default".to_string(), 1)])
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mediaqueue")
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding jobs, failed jobs, cron jobs and settings.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Keep everything in memory (nothing survives a restart).
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            in_memory: false,
        }
    }
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("queue.db")
}

/// Job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempts before a job is moved to the failed jobs table.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Connection label recorded on failed jobs.
    #[serde(default = "default_connection")]
    pub connection: String,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_connection() -> String {
    "database".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            connection: default_connection(),
        }
    }
}

/// Retry configuration for transient store failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per store operation.
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay, in milliseconds.
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_jitter_ms() -> u64 {
    300
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl RetryConfig {
    /// Get the base delay as Duration.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Get the jitter bound as Duration.
    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}

/// Worker loop and pool pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Pause after a reservation attempt found no work.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after a job finished, successfully or not.
    #[serde(default = "default_cycle_pause_ms")]
    pub cycle_pause_ms: u64,

    /// Delay between worker spawns while ramping a pool up.
    #[serde(default = "default_ramp_up_delay_ms")]
    pub ramp_up_delay_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_cycle_pause_ms() -> u64 {
    1000
}

fn default_ramp_up_delay_ms() -> u64 {
    250
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            cycle_pause_ms: default_cycle_pause_ms(),
            ramp_up_delay_ms: default_ramp_up_delay_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cycle_pause(&self) -> Duration {
        Duration::from_millis(self.cycle_pause_ms)
    }

    pub fn ramp_up_delay(&self) -> Duration {
        Duration::from_millis(self.ramp_up_delay_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to also write daily-rotated log files.
    #[serde(default = "default_true")]
    pub file: bool,

    /// Directory for log files.
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_directory() -> PathBuf {
    default_data_dir().join("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_true(),
            directory: default_log_directory(),
        }
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
