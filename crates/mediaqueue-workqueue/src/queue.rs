//! Durable job queue.
//!
//! [`JobQueue`] owns the queue's business rules on top of a [`QueueStore`]:
//! payload de-duplication, reservation, attempt counting, dead-lettering and
//! requeueing. Every operation that touches the store first takes one
//! process-wide lock, so two workers can never reserve the same row.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mediaqueue_config::{QueueConfig, RetryConfig};

use crate::error::QueueError;
use crate::job::{FailedJob, JobId, QueuedJob};
use crate::retry::RetryPolicy;
use crate::store::QueueStore;

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// Durable job queue over a [`QueueStore`].
pub struct JobQueue {
    store: Arc<dyn QueueStore>,
    lock: Mutex<()>,
    max_attempts: u32,
    connection: String,
    retry: RetryPolicy,
}

impl JobQueue {
    /// Create a queue with default settings.
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self::with_config(store, &QueueConfig::default(), &RetryConfig::default())
    }

    /// Create a queue from configuration.
    pub fn with_config(
        store: Arc<dyn QueueStore>,
        queue: &QueueConfig,
        retry: &RetryConfig,
    ) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
            max_attempts: queue.max_attempts,
            connection: queue.connection.clone(),
            retry: RetryPolicy::from(retry),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Attempts before a job is dead-lettered.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Connection label stamped on failed jobs.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    /// Add a job unless a job with the same payload is already queued.
    ///
    /// Returns `None` when the job was absorbed as a duplicate.
    pub async fn enqueue(&self, job: QueuedJob) -> Result<Option<QueuedJob>, QueueError> {
        let _guard = self.lock.lock().await;

        if self.store.job_exists(&job.payload).await? {
            debug!(queue = %job.queue, "Duplicate job absorbed");
            return Ok(None);
        }

        let job = self.store.add_job(job).await?;
        self.store.save_changes().await?;
        debug!(queue = %job.queue, job_id = %job.id, priority = job.priority, "Enqueued job");
        Ok(Some(job))
    }

    /// Reserve the next eligible job of `queue` for a worker.
    ///
    /// A caller that still holds a job (`current_job_id` is `Some`) never
    /// gets another one. Store failures are retried and then reported as
    /// `None`.
    pub async fn reserve_job(
        &self,
        queue: &str,
        current_job_id: Option<JobId>,
    ) -> Option<QueuedJob> {
        let _guard = self.lock.lock().await;

        self.retry
            .run("reserve_job", move || async move {
                let Some(mut job) = self
                    .store
                    .get_next_job(queue, self.max_attempts, current_job_id)
                    .await?
                else {
                    return Ok(None);
                };

                job.reserved_at = Some(Utc::now());
                job.attempts += 1;
                self.store.update_job(&job).await?;
                self.store.save_changes().await?;
                Ok(Some(job))
            })
            .await
            .flatten()
            .inspect(|job| {
                debug!(queue, job_id = %job.id, attempts = job.attempts, "Reserved job");
            })
    }

    /// Record a failed attempt.
    ///
    /// The reservation is released. Once the job has used up its attempts it
    /// is moved to the failed jobs table with `exception` as the reason.
    pub async fn fail_job(&self, job: &QueuedJob, exception: &str) {
        let _guard = self.lock.lock().await;

        self.retry
            .run("fail_job", move || async move {
                let mut job = job.clone();
                job.reserved_at = None;

                if job.is_exhausted(self.max_attempts) {
                    let failed = FailedJob::from_job(&job, &self.connection, exception);
                    let failed = self.store.move_to_failed(job.id, failed).await?;
                    self.store.save_changes().await?;
                    warn!(
                        queue = %job.queue,
                        job_id = %job.id,
                        failed_id = %failed.id,
                        attempts = job.attempts,
                        "Job moved to failed jobs"
                    );
                } else {
                    self.store.update_job(&job).await?;
                    self.store.save_changes().await?;
                    debug!(
                        queue = %job.queue,
                        job_id = %job.id,
                        attempts = job.attempts,
                        "Job released for retry"
                    );
                }
                Ok(())
            })
            .await;
    }

    /// Remove a completed job.
    pub async fn delete_job(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let _guard = self.lock.lock().await;
        self.store.remove_job(job.id).await?;
        self.store.save_changes().await
    }

    /// Move one failed job back into the queue with a fresh attempt count.
    ///
    /// Returns `None` for an unknown id or when the store keeps failing. The
    /// move is atomic, so a failed attempt leaves the failed row in place.
    pub async fn requeue_failed_job(&self, id: JobId) -> Option<QueuedJob> {
        let _guard = self.lock.lock().await;
        self.requeue(id).await
    }

    /// Requeue every failed job, or only the one matching `id`.
    ///
    /// Returns how many jobs went back into the queue. Rows that could not be
    /// moved stay in the failed jobs table.
    pub async fn retry_failed_jobs(&self, id: Option<JobId>) -> usize {
        let _guard = self.lock.lock().await;

        let Some(failed) = self
            .retry
            .run("retry_failed_jobs", move || async move {
                self.store.get_failed_jobs(id).await
            })
            .await
        else {
            return 0;
        };

        let mut count = 0;
        for row in &failed {
            if self.requeue(row.id).await.is_some() {
                count += 1;
            }
        }
        info!(count, total = failed.len(), "Requeued failed jobs");
        count
    }

    async fn requeue(&self, id: JobId) -> Option<QueuedJob> {
        self.retry
            .run("requeue_failed_job", move || async move {
                let job = self.store.restore_failed_job(id).await?;
                self.store.save_changes().await?;
                Ok(job)
            })
            .await
            .flatten()
            .inspect(|job| {
                debug!(
                    queue = %job.queue,
                    failed_id = %id,
                    job_id = %job.id,
                    "Requeued failed job"
                );
            })
    }

    /// Release every reservation. Run once at startup, before any worker
    /// starts, to reclaim jobs held by a process that died.
    pub async fn reset_all_reserved_jobs(&self) -> Result<u64, QueueError> {
        let _guard = self.lock.lock().await;
        let released = self.store.reset_all_reserved_jobs().await?;
        self.store.save_changes().await?;
        if released > 0 {
            info!(released, "Released reserved jobs");
        }
        Ok(released)
    }

    /// Remove and return the oldest job regardless of queue, priority or
    /// reservation. This drains the table; it is not how workers get work.
    pub async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        let _guard = self.lock.lock().await;

        let Some(job) = self.store.get_next_job("", self.max_attempts, None).await? else {
            return Ok(None);
        };
        self.store.remove_job(job.id).await?;
        self.store.save_changes().await?;
        Ok(Some(job))
    }

    /// Failed jobs, all or just one.
    pub async fn failed_jobs(&self, id: Option<JobId>) -> Result<Vec<FailedJob>, QueueError> {
        self.store.get_failed_jobs(id).await
    }

    /// Look up a queued job.
    pub async fn find_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError> {
        self.store.find_job(id).await
    }
}
