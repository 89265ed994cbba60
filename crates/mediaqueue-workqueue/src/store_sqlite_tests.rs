use super::*;
use crate::store_contract as contract;

async fn store() -> SqliteQueueStore {
    SqliteQueueStore::in_memory().await.unwrap()
}

const REJECT_FAILED_INSERTS: &str = "CREATE TRIGGER reject_failed BEFORE INSERT ON failed_jobs
     BEGIN SELECT RAISE(ABORT, 'disk full'); END;";

const REJECT_JOB_INSERTS: &str = "CREATE TRIGGER reject_jobs BEFORE INSERT ON queue_jobs
     BEGIN SELECT RAISE(ABORT, 'disk full'); END;";

#[tokio::test]
async fn test_add_assigns_ids() {
    contract::add_assigns_ids(&store().await).await;
}

#[tokio::test]
async fn test_next_job_by_priority() {
    contract::next_job_by_priority(&store().await).await;
}

#[tokio::test]
async fn test_next_job_tie_break() {
    contract::next_job_tie_breaks_on_lowest_id(&store().await).await;
}

#[tokio::test]
async fn test_next_job_skips_reserved_and_exhausted() {
    contract::next_job_skips_reserved_and_exhausted(&store().await).await;
}

#[tokio::test]
async fn test_next_job_guard_blocks_when_holding() {
    contract::next_job_guard_blocks_when_holding(&store().await).await;
}

#[tokio::test]
async fn test_empty_queue_name_returns_first_row() {
    contract::empty_queue_name_returns_first_row(&store().await).await;
}

#[tokio::test]
async fn test_job_exists() {
    contract::job_exists_by_payload(&store().await).await;
}

#[tokio::test]
async fn test_update_and_reset() {
    contract::update_and_reset(&store().await).await;
}

#[tokio::test]
async fn test_remove_and_count() {
    contract::remove_and_count(&store().await).await;
}

#[tokio::test]
async fn test_failed_job_lifecycle() {
    contract::failed_job_lifecycle(&store().await).await;
}

#[tokio::test]
async fn test_move_and_restore_failed() {
    contract::move_and_restore_failed(&store().await).await;
}

#[tokio::test]
async fn test_cron_job_lifecycle() {
    contract::cron_job_lifecycle(&store().await).await;
}

#[tokio::test]
async fn test_move_to_failed_rolls_back_on_insert_error() {
    let store = store().await;
    let job = store.add_job(QueuedJob::new("encoder", "payload", 0)).await.unwrap();
    store.execute_batch(REJECT_FAILED_INSERTS).await.unwrap();

    let err = store
        .move_to_failed(job.id, FailedJob::from_job(&job, "database", "boom"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Relational(_)));
    assert!(store.find_job(job.id).await.unwrap().is_some());
    assert!(store.get_failed_jobs(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_failed_rolls_back_on_insert_error() {
    let store = store().await;
    let job = QueuedJob::new("encoder", "payload", 0);
    let failed = store
        .add_failed_job(FailedJob::from_job(&job, "database", "boom"))
        .await
        .unwrap();
    store.execute_batch(REJECT_JOB_INSERTS).await.unwrap();

    assert!(store.restore_failed_job(failed.id).await.is_err());
    assert!(store.find_failed_job(failed.id).await.unwrap().is_some());
    assert_eq!(store.count_jobs(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_cron_name_is_relational() {
    let store = store().await;
    store.add_cron_job(CronJob::new("scan", "* * * * *", "scan")).await.unwrap();

    let err = store
        .add_cron_job(CronJob::new("scan", "0 * * * *", "scan"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Relational(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_configuration_values() {
    contract::configuration_values(&store().await).await;
}

#[tokio::test]
async fn test_configuration_attribution() {
    let store = store().await;
    store.set_value_by("encoderRunners", "3", Some("admin")).await.unwrap();

    let entry = store.entry("encoderRunners").await.unwrap().unwrap();
    assert_eq!(entry.value, "3");
    assert_eq!(entry.modified_by.as_deref(), Some("admin"));
}

#[tokio::test]
async fn test_jobs_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    let store = SqliteQueueStore::open(&path).await.unwrap();
    let mut job = store
        .add_job(QueuedJob::new("encoder", r#"{"type":"encode"}"#, 4))
        .await
        .unwrap();
    job.reserved_at = Some(Utc::now());
    job.attempts = 1;
    store.update_job(&job).await.unwrap();
    store.close().await.unwrap();

    let store = SqliteQueueStore::open(&path).await.unwrap();
    let found = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(found.priority, 4);
    assert_eq!(found.attempts, 1);
    assert!(found.reserved_at.is_some());

    assert_eq!(store.reset_all_reserved_jobs().await.unwrap(), 1);
}

#[tokio::test]
async fn test_closed_connection_is_relational() {
    let conn = Connection::open_in_memory().await.unwrap();
    let clone = conn.clone();
    conn.close().await.unwrap();

    let store = SqliteQueueStore { conn: clone };
    let err = store.find_job(JobId(1)).await.unwrap_err();
    assert!(matches!(err, QueueError::Relational(_)));
}

#[test]
fn test_busy_is_retryable() {
    let err = rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("database is locked".to_string()),
    );
    assert!(map_sqlite_error(tokio_rusqlite::Error::Rusqlite(err)).is_retryable());
}
