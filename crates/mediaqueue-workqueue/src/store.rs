//! Queue persistence contract.
//!
//! The store holds four record kinds (queued jobs, failed jobs, cron jobs and
//! configuration entries) and carries no business rules. Locking is the
//! caller's job: [`JobQueue`](crate::JobQueue) serializes every mutation behind
//! one mutex before it reaches a store.

use async_trait::async_trait;

use crate::error::QueueError;
use crate::job::{CronJob, FailedJob, JobId, QueuedJob};

/// Persistence for queued, failed and cron jobs.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a job and return it with its assigned id.
    async fn add_job(&self, job: QueuedJob) -> Result<QueuedJob, QueueError>;

    /// Delete a job. Missing rows are ignored.
    async fn remove_job(&self, id: JobId) -> Result<(), QueueError>;

    /// Select the next job to reserve.
    ///
    /// With a non-empty `queue`, returns the highest-priority row of that queue
    /// with `reserved_at` unset and `attempts <= max_attempts`, lowest id first
    /// on ties. Whenever `current_job_id` is `Some`, nothing is returned: a
    /// caller that still holds a job never gets a second one.
    ///
    /// With an empty `queue`, returns the first row by id with no filtering
    /// at all. That path exists for [`JobQueue::dequeue`](crate::JobQueue::dequeue).
    async fn get_next_job(
        &self,
        queue: &str,
        max_attempts: u32,
        current_job_id: Option<JobId>,
    ) -> Result<Option<QueuedJob>, QueueError>;

    async fn find_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError>;

    /// Check for a row with a byte-identical payload.
    async fn job_exists(&self, payload: &str) -> Result<bool, QueueError>;

    /// Persist the mutable columns (`priority`, `attempts`, `reserved_at`,
    /// `available_at`) of an existing row.
    async fn update_job(&self, job: &QueuedJob) -> Result<(), QueueError>;

    /// Clear `reserved_at` on every row. Returns the number of rows released.
    async fn reset_all_reserved_jobs(&self) -> Result<u64, QueueError>;

    /// Count queued jobs, optionally for one queue.
    async fn count_jobs(&self, queue: Option<&str>) -> Result<u64, QueueError>;

    async fn add_failed_job(&self, job: FailedJob) -> Result<FailedJob, QueueError>;

    async fn remove_failed_job(&self, id: JobId) -> Result<(), QueueError>;

    /// Delete queued job `job_id` and insert `failed`, atomically. On error
    /// neither table has changed.
    async fn move_to_failed(
        &self,
        job_id: JobId,
        failed: FailedJob,
    ) -> Result<FailedJob, QueueError>;

    /// Delete failed job `id` and insert a fresh queued job with its queue and
    /// payload, atomically. Returns `None` for an unknown id.
    async fn restore_failed_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError>;

    async fn find_failed_job(&self, id: JobId) -> Result<Option<FailedJob>, QueueError>;

    /// All failed jobs ordered by id, or just the one matching `id`.
    async fn get_failed_jobs(&self, id: Option<JobId>) -> Result<Vec<FailedJob>, QueueError>;

    async fn get_enabled_cron_jobs(&self) -> Result<Vec<CronJob>, QueueError>;

    /// Every cron job, enabled or not.
    async fn get_cron_jobs(&self) -> Result<Vec<CronJob>, QueueError>;

    async fn find_cron_job_by_name(&self, name: &str) -> Result<Option<CronJob>, QueueError>;

    /// Insert a cron job. Names are unique; a duplicate is a relational error.
    async fn add_cron_job(&self, job: CronJob) -> Result<CronJob, QueueError>;

    async fn update_cron_job(&self, job: &CronJob) -> Result<(), QueueError>;

    async fn remove_cron_job(&self, id: JobId) -> Result<(), QueueError>;

    /// Flush pending writes. Stores that commit on every call keep the default.
    async fn save_changes(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Key/value settings consumed by the pool manager and admin surfaces.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<String>, QueueError>;

    async fn set_value(&self, key: &str, value: &str) -> Result<(), QueueError> {
        self.set_value_by(key, value, None).await
    }

    /// Set a value and record who changed it.
    async fn set_value_by(
        &self,
        key: &str,
        value: &str,
        actor: Option<&str>,
    ) -> Result<(), QueueError>;

    async fn has_key(&self, key: &str) -> Result<bool, QueueError> {
        Ok(self.get_value(key).await?.is_some())
    }
}

/// Settings key holding the desired worker count of a queue.
pub fn runners_key(queue: &str) -> String {
    format!("{}Runners", queue)
}
