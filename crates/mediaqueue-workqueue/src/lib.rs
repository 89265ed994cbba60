//! # mediaqueue Work Queue
//!
//! Durable job queue and worker pools for the mediaqueue job engine.
//!
//! ## Features
//!
//! - Persistent jobs with priorities and payload de-duplication
//! - Bounded retries with a failed jobs (dead-letter) table
//! - Crash recovery by releasing stale reservations at startup
//! - Per-queue worker pools resizable at runtime
//! - Cron job records for an external scheduler
//! - In-memory and SQLite stores

pub mod dispatcher;
pub mod error;
pub mod job;
pub mod payload;
pub mod pool;
pub mod queue;
pub mod readiness;
pub mod retry;
mod schema;
pub mod store;
#[cfg(test)]
mod store_contract;
pub mod store_memory;
pub mod store_sqlite;
pub mod worker;

pub use dispatcher::JobDispatcher;
pub use error::{QueueError, QueueResult};
pub use job::{ConfigEntry, CronJob, FailedJob, JobId, QueuedJob};
pub use payload::{DEFAULT_QUEUE, JobRegistry, QueueableJob, ShouldQueue};
pub use pool::{WorkerPoolManager, WorkerSnapshot};
pub use queue::JobQueue;
pub use readiness::ReadinessSignal;
pub use retry::RetryPolicy;
pub use store::{ConfigurationStore, QueueStore, runners_key};
pub use store_memory::MemoryQueueStore;
pub use store_sqlite::SqliteQueueStore;
pub use worker::{WorkCycleListener, Worker, WorkerSettings, WorkerState};
