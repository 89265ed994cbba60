//! SQLite queue store.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{ErrorCode, OptionalExtension, Row, params};
use tokio_rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::{ConfigEntry, CronJob, FailedJob, JobId, QueuedJob};
use crate::schema::init_schema;
use crate::store::{ConfigurationStore, QueueStore};

#[cfg(test)]
#[path = "store_sqlite_tests.rs"]
mod tests;

const JOB_COLUMNS: &str =
    "id, queue, priority, payload, attempts, reserved_at, available_at, created_at";
const FAILED_COLUMNS: &str = "id, uuid, connection, queue, payload, exception, failed_at";
const CRON_COLUMNS: &str = "id, name, cron_expression, job_type, parameters, is_enabled, \
     last_run, next_run, created_at, updated_at";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed queue store. Every call commits before it returns; moves
/// between the live and failed tables run in one transaction.
pub struct SqliteQueueStore {
    conn: Connection,
}

impl SqliteQueueStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| QueueError::Relational(e.to_string()))?;
        Self::with_connection(conn).await
    }

    /// Open (or create) a database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "Opening queue database");
        let conn = Connection::open(path)
            .await
            .map_err(|e| QueueError::Relational(e.to_string()))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, QueueError> {
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            init_schema(conn)
        })
        .await
        .map_err(map_sqlite_error)?;
        Ok(Self { conn })
    }

    /// Close the connection, flushing the background thread.
    pub async fn close(self) -> Result<(), QueueError> {
        self.conn.close().await.map_err(map_sqlite_error)
    }

    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<(), QueueError> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await
            .map_err(map_sqlite_error)
    }

    /// Look up a settings entry including attribution.
    pub async fn entry(&self, key: &str) -> Result<Option<ConfigEntry>, QueueError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                let entry = conn
                    .query_row(
                        "SELECT key, value, modified_by, updated_at FROM configuration WHERE key = ?1",
                        [&key],
                        |row| {
                            Ok(ConfigEntry {
                                key: row.get(0)?,
                                value: row.get(1)?,
                                modified_by: row.get(2)?,
                                updated_at: parse_time(3, row.get(3)?)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(entry)
            })
            .await
            .map_err(map_sqlite_error)
    }
}

/// Sort a connection error into the retryable/non-retryable buckets.
pub(crate) fn map_sqlite_error(err: tokio_rusqlite::Error) -> QueueError {
    match &err {
        tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_) => {
            QueueError::Relational(err.to_string())
        }
        tokio_rusqlite::Error::Rusqlite(e) => classify(e),
        _ => QueueError::Storage(err.to_string()),
    }
}

fn classify(err: &rusqlite::Error) -> QueueError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            QueueError::Storage(err.to_string())
        }
        Some(
            ErrorCode::ConstraintViolation
            | ErrorCode::CannotOpen
            | ErrorCode::ReadOnly
            | ErrorCode::NotADatabase
            | ErrorCode::PermissionDenied,
        ) => QueueError::Relational(err.to_string()),
        _ => QueueError::Storage(err.to_string()),
    }
}

fn parse_time(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_time(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(idx, v)).transpose()
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<QueuedJob> {
    Ok(QueuedJob {
        id: JobId(row.get(0)?),
        queue: row.get(1)?,
        priority: row.get(2)?,
        payload: row.get(3)?,
        attempts: row.get(4)?,
        reserved_at: parse_optional_time(5, row.get(5)?)?,
        available_at: parse_time(6, row.get(6)?)?,
        created_at: parse_time(7, row.get(7)?)?,
    })
}

fn failed_from_row(row: &Row<'_>) -> rusqlite::Result<FailedJob> {
    let uuid: String = row.get(1)?;
    let uuid = Uuid::parse_str(&uuid)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    Ok(FailedJob {
        id: JobId(row.get(0)?),
        uuid,
        connection: row.get(2)?,
        queue: row.get(3)?,
        payload: row.get(4)?,
        exception: row.get(5)?,
        failed_at: parse_time(6, row.get(6)?)?,
    })
}

fn cron_from_row(row: &Row<'_>) -> rusqlite::Result<CronJob> {
    Ok(CronJob {
        id: JobId(row.get(0)?),
        name: row.get(1)?,
        cron_expression: row.get(2)?,
        job_type: row.get(3)?,
        parameters: row.get(4)?,
        is_enabled: row.get(5)?,
        last_run: parse_optional_time(6, row.get(6)?)?,
        next_run: parse_optional_time(7, row.get(7)?)?,
        created_at: parse_time(8, row.get(8)?)?,
        updated_at: parse_time(9, row.get(9)?)?,
    })
}

fn to_text(time: Option<DateTime<Utc>>) -> Option<String> {
    time.map(|t| t.to_rfc3339())
}

fn insert_job(conn: &rusqlite::Connection, job: &QueuedJob) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO queue_jobs (queue, priority, payload, attempts, reserved_at, available_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            job.queue,
            job.priority,
            job.payload,
            job.attempts,
            to_text(job.reserved_at),
            job.available_at.to_rfc3339(),
            job.created_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_failed(conn: &rusqlite::Connection, job: &FailedJob) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO failed_jobs (uuid, connection, queue, payload, exception, failed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            job.uuid.to_string(),
            job.connection,
            job.queue,
            job.payload,
            job.exception,
            job.failed_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn add_job(&self, mut job: QueuedJob) -> Result<QueuedJob, QueueError> {
        let row = job.clone();
        let id = self
            .conn
            .call(move |conn| Ok(insert_job(conn, &row)?))
            .await
            .map_err(map_sqlite_error)?;
        job.id = JobId(id);
        Ok(job)
    }

    async fn remove_job(&self, id: JobId) -> Result<(), QueueError> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM queue_jobs WHERE id = ?1", [id.0])?;
                Ok(())
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn get_next_job(
        &self,
        queue: &str,
        max_attempts: u32,
        current_job_id: Option<JobId>,
    ) -> Result<Option<QueuedJob>, QueueError> {
        if !queue.is_empty() && current_job_id.is_some() {
            return Ok(None);
        }

        let queue = queue.to_string();
        self.conn
            .call(move |conn| {
                let job = if queue.is_empty() {
                    conn.query_row(
                        &format!("SELECT {JOB_COLUMNS} FROM queue_jobs ORDER BY id LIMIT 1"),
                        [],
                        job_from_row,
                    )
                    .optional()?
                } else {
                    conn.query_row(
                        &format!(
                            "SELECT {JOB_COLUMNS} FROM queue_jobs
                             WHERE queue = ?1 AND reserved_at IS NULL AND attempts <= ?2
                             ORDER BY priority DESC, id ASC LIMIT 1"
                        ),
                        params![queue, max_attempts],
                        job_from_row,
                    )
                    .optional()?
                };
                Ok(job)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn find_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError> {
        self.conn
            .call(move |conn| {
                let job = conn
                    .query_row(
                        &format!("SELECT {JOB_COLUMNS} FROM queue_jobs WHERE id = ?1"),
                        [id.0],
                        job_from_row,
                    )
                    .optional()?;
                Ok(job)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn job_exists(&self, payload: &str) -> Result<bool, QueueError> {
        let payload = payload.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT 1 FROM queue_jobs WHERE payload = ?1 LIMIT 1")?;
                Ok(stmt.exists([&payload])?)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn update_job(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let job = job.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE queue_jobs SET priority = ?1, attempts = ?2, reserved_at = ?3, available_at = ?4
                     WHERE id = ?5",
                    params![
                        job.priority,
                        job.attempts,
                        to_text(job.reserved_at),
                        job.available_at.to_rfc3339(),
                        job.id.0,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn reset_all_reserved_jobs(&self) -> Result<u64, QueueError> {
        self.conn
            .call(|conn| {
                let released = conn.execute(
                    "UPDATE queue_jobs SET reserved_at = NULL WHERE reserved_at IS NOT NULL",
                    [],
                )?;
                Ok(released as u64)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn count_jobs(&self, queue: Option<&str>) -> Result<u64, QueueError> {
        let queue = queue.map(str::to_string);
        self.conn
            .call(move |conn| {
                let count: i64 = match queue {
                    Some(name) => conn.query_row(
                        "SELECT COUNT(*) FROM queue_jobs WHERE queue = ?1",
                        [name],
                        |row| row.get(0),
                    )?,
                    None => {
                        conn.query_row("SELECT COUNT(*) FROM queue_jobs", [], |row| row.get(0))?
                    }
                };
                Ok(count as u64)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn add_failed_job(&self, mut job: FailedJob) -> Result<FailedJob, QueueError> {
        let row = job.clone();
        let id = self
            .conn
            .call(move |conn| Ok(insert_failed(conn, &row)?))
            .await
            .map_err(map_sqlite_error)?;
        job.id = JobId(id);
        Ok(job)
    }

    async fn remove_failed_job(&self, id: JobId) -> Result<(), QueueError> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM failed_jobs WHERE id = ?1", [id.0])?;
                Ok(())
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn move_to_failed(
        &self,
        job_id: JobId,
        mut failed: FailedJob,
    ) -> Result<FailedJob, QueueError> {
        let row = failed.clone();
        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM queue_jobs WHERE id = ?1", [job_id.0])?;
                let id = insert_failed(&tx, &row)?;
                tx.commit()?;
                Ok(id)
            })
            .await
            .map_err(map_sqlite_error)?;
        failed.id = JobId(id);
        Ok(failed)
    }

    async fn restore_failed_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let failed = tx
                    .query_row(
                        &format!("SELECT {FAILED_COLUMNS} FROM failed_jobs WHERE id = ?1"),
                        [id.0],
                        failed_from_row,
                    )
                    .optional()?;
                let Some(failed) = failed else {
                    return Ok(None);
                };

                tx.execute("DELETE FROM failed_jobs WHERE id = ?1", [id.0])?;
                let mut job = failed.to_queued_job();
                job.id = JobId(insert_job(&tx, &job)?);
                tx.commit()?;
                Ok(Some(job))
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn find_failed_job(&self, id: JobId) -> Result<Option<FailedJob>, QueueError> {
        self.conn
            .call(move |conn| {
                let job = conn
                    .query_row(
                        &format!("SELECT {FAILED_COLUMNS} FROM failed_jobs WHERE id = ?1"),
                        [id.0],
                        failed_from_row,
                    )
                    .optional()?;
                Ok(job)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn get_failed_jobs(&self, id: Option<JobId>) -> Result<Vec<FailedJob>, QueueError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {FAILED_COLUMNS} FROM failed_jobs
                     WHERE ?1 IS NULL OR id = ?1 ORDER BY id"
                ))?;
                let jobs = stmt
                    .query_map([id.map(|id| id.0)], failed_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(jobs)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn get_enabled_cron_jobs(&self) -> Result<Vec<CronJob>, QueueError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CRON_COLUMNS} FROM cron_jobs WHERE is_enabled = 1 ORDER BY id"
                ))?;
                let jobs = stmt
                    .query_map([], cron_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(jobs)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn get_cron_jobs(&self) -> Result<Vec<CronJob>, QueueError> {
        self.conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {CRON_COLUMNS} FROM cron_jobs ORDER BY id"))?;
                let jobs = stmt
                    .query_map([], cron_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(jobs)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn find_cron_job_by_name(&self, name: &str) -> Result<Option<CronJob>, QueueError> {
        let name = name.to_string();
        self.conn
            .call(move |conn| {
                let job = conn
                    .query_row(
                        &format!("SELECT {CRON_COLUMNS} FROM cron_jobs WHERE name = ?1"),
                        [&name],
                        cron_from_row,
                    )
                    .optional()?;
                Ok(job)
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn add_cron_job(&self, mut job: CronJob) -> Result<CronJob, QueueError> {
        let row = job.clone();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO cron_jobs (name, cron_expression, job_type, parameters, is_enabled,
                     last_run, next_run, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        row.name,
                        row.cron_expression,
                        row.job_type,
                        row.parameters,
                        row.is_enabled,
                        to_text(row.last_run),
                        to_text(row.next_run),
                        row.created_at.to_rfc3339(),
                        row.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(map_sqlite_error)?;
        job.id = JobId(id);
        Ok(job)
    }

    async fn update_cron_job(&self, job: &CronJob) -> Result<(), QueueError> {
        let job = job.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE cron_jobs SET name = ?1, cron_expression = ?2, job_type = ?3, parameters = ?4,
                     is_enabled = ?5, last_run = ?6, next_run = ?7, updated_at = ?8
                     WHERE id = ?9",
                    params![
                        job.name,
                        job.cron_expression,
                        job.job_type,
                        job.parameters,
                        job.is_enabled,
                        to_text(job.last_run),
                        to_text(job.next_run),
                        job.updated_at.to_rfc3339(),
                        job.id.0,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_sqlite_error)
    }

    async fn remove_cron_job(&self, id: JobId) -> Result<(), QueueError> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM cron_jobs WHERE id = ?1", [id.0])?;
                Ok(())
            })
            .await
            .map_err(map_sqlite_error)
    }
}

#[async_trait]
impl ConfigurationStore for SqliteQueueStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, QueueError> {
        Ok(self.entry(key).await?.map(|e| e.value))
    }

    async fn set_value_by(
        &self,
        key: &str,
        value: &str,
        actor: Option<&str>,
    ) -> Result<(), QueueError> {
        let entry = ConfigEntry::new(key, value, actor);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO configuration (key, value, modified_by, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         modified_by = excluded.modified_by,
                         updated_at = excluded.updated_at",
                    params![
                        entry.key,
                        entry.value,
                        entry.modified_by,
                        entry.updated_at.to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_sqlite_error)
    }
}
