//! Persisted record kinds: queued jobs, failed jobs, cron jobs and
//! configuration entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        JobId(id)
    }
}

/// A pending or in-flight unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Assigned by the store on insert; 0 until then.
    pub id: JobId,
    /// Queue the job is reserved from.
    pub queue: String,
    /// Higher values are reserved first.
    pub priority: i32,
    /// Encoded job, see [`crate::payload`].
    pub payload: String,
    /// Incremented on every reservation.
    pub attempts: u32,
    /// Set while a worker holds the job.
    pub reserved_at: Option<DateTime<Utc>>,
    /// Earliest time the job was meant to run. Informational.
    pub available_at: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl QueuedJob {
    /// Create an unsaved job.
    pub fn new(queue: impl Into<String>, payload: impl Into<String>, priority: i32) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::default(),
            queue: queue.into(),
            priority,
            payload: payload.into(),
            attempts: 0,
            reserved_at: None,
            available_at: now,
            created_at: now,
        }
    }

    /// Check if a worker currently holds the job.
    pub fn is_reserved(&self) -> bool {
        self.reserved_at.is_some()
    }

    /// Check if the job can be handed to a worker.
    pub fn is_eligible(&self, max_attempts: u32) -> bool {
        self.reserved_at.is_none() && self.attempts <= max_attempts
    }

    /// Check if the retry budget is spent.
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.attempts >= max_attempts
    }
}

/// Dead-letter record of a job that exhausted its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedJob {
    pub id: JobId,
    /// Stable external reference.
    pub uuid: Uuid,
    /// Logical source label.
    pub connection: String,
    pub queue: String,
    /// Copy of the original payload.
    pub payload: String,
    /// Plain-text failure description (message, cause chain, backtrace).
    pub exception: String,
    pub failed_at: DateTime<Utc>,
}

impl FailedJob {
    /// Build the dead-letter row for an exhausted job.
    pub fn from_job(
        job: &QueuedJob,
        connection: impl Into<String>,
        exception: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::default(),
            uuid: Uuid::new_v4(),
            connection: connection.into(),
            queue: job.queue.clone(),
            payload: job.payload.clone(),
            exception: exception.into(),
            failed_at: Utc::now(),
        }
    }

    /// Fresh queued job carrying the same queue and payload.
    pub fn to_queued_job(&self) -> QueuedJob {
        QueuedJob::new(self.queue.clone(), self.payload.clone(), 0)
    }
}

/// A named recurring trigger, evaluated by an external scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronJob {
    pub id: JobId,
    /// Unique name.
    pub name: String,
    /// Five-field cron expression.
    pub cron_expression: String,
    /// Discriminator telling the scheduler what to dispatch.
    pub job_type: String,
    /// Opaque parameter blob handed to the dispatched job.
    pub parameters: String,
    pub is_enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CronJob {
    /// Create an enabled cron job with empty parameters.
    pub fn new(
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        job_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::default(),
            name: name.into(),
            cron_expression: cron_expression.into(),
            job_type: job_type.into(),
            parameters: String::new(),
            is_enabled: true,
            last_run: None,
            next_run: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the parameter blob.
    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = parameters.into();
        self
    }

    /// Mark the cron job as disabled.
    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    /// Record a firing and the next due time.
    pub fn mark_run(&mut self, ran_at: DateTime<Utc>, next_run: Option<DateTime<Utc>>) {
        self.last_run = Some(ran_at);
        self.next_run = next_run;
        self.updated_at = Utc::now();
    }
}

/// Operator-tunable key/value setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    /// Who last changed the value, when known.
    pub modified_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigEntry {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        modified_by: Option<&str>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            modified_by: modified_by.map(str::to_string),
            updated_at: Utc::now(),
        }
    }
}
