//! In-memory queue store for tests and ephemeral runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::QueueError;
use crate::job::{ConfigEntry, CronJob, FailedJob, JobId, QueuedJob};
use crate::store::{ConfigurationStore, QueueStore};

#[derive(Default)]
struct MemoryTables {
    jobs: BTreeMap<JobId, QueuedJob>,
    failed_jobs: BTreeMap<JobId, FailedJob>,
    cron_jobs: BTreeMap<JobId, CronJob>,
    settings: HashMap<String, ConfigEntry>,
    next_id: i64,
}

impl MemoryTables {
    fn next_id(&mut self) -> JobId {
        self.next_id += 1;
        JobId(self.next_id)
    }
}

/// In-memory queue store. Rows are kept in id order so the first row of a
/// table is the oldest.
pub struct MemoryQueueStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryQueueStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(MemoryTables::default()),
        }
    }

    /// Look up a settings entry including attribution.
    pub async fn entry(&self, key: &str) -> Option<ConfigEntry> {
        self.tables.read().await.settings.get(key).cloned()
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn add_job(&self, mut job: QueuedJob) -> Result<QueuedJob, QueueError> {
        let mut tables = self.tables.write().await;
        job.id = tables.next_id();
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn remove_job(&self, id: JobId) -> Result<(), QueueError> {
        self.tables.write().await.jobs.remove(&id);
        Ok(())
    }

    async fn get_next_job(
        &self,
        queue: &str,
        max_attempts: u32,
        current_job_id: Option<JobId>,
    ) -> Result<Option<QueuedJob>, QueueError> {
        let tables = self.tables.read().await;

        if queue.is_empty() {
            return Ok(tables.jobs.values().next().cloned());
        }
        if current_job_id.is_some() {
            return Ok(None);
        }

        // Iteration is in ascending id order; keeping the first maximum gives
        // the lowest id among equal priorities.
        let mut best: Option<&QueuedJob> = None;
        for job in tables
            .jobs
            .values()
            .filter(|j| j.queue == queue && j.is_eligible(max_attempts))
        {
            if best.is_none_or(|b| job.priority > b.priority) {
                best = Some(job);
            }
        }
        Ok(best.cloned())
    }

    async fn find_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn job_exists(&self, payload: &str) -> Result<bool, QueueError> {
        let tables = self.tables.read().await;
        Ok(tables.jobs.values().any(|j| j.payload == payload))
    }

    async fn update_job(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut tables = self.tables.write().await;
        if let Some(stored) = tables.jobs.get_mut(&job.id) {
            stored.priority = job.priority;
            stored.attempts = job.attempts;
            stored.reserved_at = job.reserved_at;
            stored.available_at = job.available_at;
        }
        Ok(())
    }

    async fn reset_all_reserved_jobs(&self) -> Result<u64, QueueError> {
        let mut tables = self.tables.write().await;
        let mut released = 0;
        for job in tables.jobs.values_mut().filter(|j| j.reserved_at.is_some()) {
            job.reserved_at = None;
            released += 1;
        }
        Ok(released)
    }

    async fn count_jobs(&self, queue: Option<&str>) -> Result<u64, QueueError> {
        let tables = self.tables.read().await;
        let count = match queue {
            Some(name) => tables.jobs.values().filter(|j| j.queue == name).count(),
            None => tables.jobs.len(),
        };
        Ok(count as u64)
    }

    async fn add_failed_job(&self, mut job: FailedJob) -> Result<FailedJob, QueueError> {
        let mut tables = self.tables.write().await;
        job.id = tables.next_id();
        tables.failed_jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn remove_failed_job(&self, id: JobId) -> Result<(), QueueError> {
        self.tables.write().await.failed_jobs.remove(&id);
        Ok(())
    }

    async fn move_to_failed(
        &self,
        job_id: JobId,
        mut failed: FailedJob,
    ) -> Result<FailedJob, QueueError> {
        let mut tables = self.tables.write().await;
        tables.jobs.remove(&job_id);
        failed.id = tables.next_id();
        tables.failed_jobs.insert(failed.id, failed.clone());
        Ok(failed)
    }

    async fn restore_failed_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError> {
        let mut tables = self.tables.write().await;
        let Some(failed) = tables.failed_jobs.remove(&id) else {
            return Ok(None);
        };
        let mut job = failed.to_queued_job();
        job.id = tables.next_id();
        tables.jobs.insert(job.id, job.clone());
        Ok(Some(job))
    }

    async fn find_failed_job(&self, id: JobId) -> Result<Option<FailedJob>, QueueError> {
        Ok(self.tables.read().await.failed_jobs.get(&id).cloned())
    }

    async fn get_failed_jobs(&self, id: Option<JobId>) -> Result<Vec<FailedJob>, QueueError> {
        let tables = self.tables.read().await;
        Ok(tables
            .failed_jobs
            .values()
            .filter(|j| id.is_none_or(|id| j.id == id))
            .cloned()
            .collect())
    }

    async fn get_enabled_cron_jobs(&self) -> Result<Vec<CronJob>, QueueError> {
        let tables = self.tables.read().await;
        Ok(tables.cron_jobs.values().filter(|j| j.is_enabled).cloned().collect())
    }

    async fn get_cron_jobs(&self) -> Result<Vec<CronJob>, QueueError> {
        Ok(self.tables.read().await.cron_jobs.values().cloned().collect())
    }

    async fn find_cron_job_by_name(&self, name: &str) -> Result<Option<CronJob>, QueueError> {
        let tables = self.tables.read().await;
        Ok(tables.cron_jobs.values().find(|j| j.name == name).cloned())
    }

    async fn add_cron_job(&self, mut job: CronJob) -> Result<CronJob, QueueError> {
        let mut tables = self.tables.write().await;
        if tables.cron_jobs.values().any(|j| j.name == job.name) {
            return Err(QueueError::Relational(format!(
                "cron job '{}' already exists",
                job.name
            )));
        }
        job.id = tables.next_id();
        tables.cron_jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn update_cron_job(&self, job: &CronJob) -> Result<(), QueueError> {
        let mut tables = self.tables.write().await;
        if let Some(stored) = tables.cron_jobs.get_mut(&job.id) {
            *stored = job.clone();
        }
        Ok(())
    }

    async fn remove_cron_job(&self, id: JobId) -> Result<(), QueueError> {
        self.tables.write().await.cron_jobs.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ConfigurationStore for MemoryQueueStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, QueueError> {
        let tables = self.tables.read().await;
        Ok(tables.settings.get(key).map(|e| e.value.clone()))
    }

    async fn set_value_by(
        &self,
        key: &str,
        value: &str,
        actor: Option<&str>,
    ) -> Result<(), QueueError> {
        let mut tables = self.tables.write().await;
        tables
            .settings
            .insert(key.to_string(), ConfigEntry::new(key, value, actor));
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_memory_tests.rs"]
mod tests;
