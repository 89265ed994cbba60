//! Behaviour every [`QueueStore`] adapter must share. Each adapter's test
//! module runs these against a fresh store.

use chrono::Utc;

use crate::job::{CronJob, FailedJob, JobId, QueuedJob};
use crate::store::{ConfigurationStore, QueueStore};

pub(crate) async fn add_assigns_ids(store: &dyn QueueStore) {
    let a = store.add_job(QueuedJob::new("default", "a", 0)).await.unwrap();
    let b = store.add_job(QueuedJob::new("default", "b", 0)).await.unwrap();
    assert_ne!(a.id, JobId(0));
    assert!(b.id > a.id);

    let found = store.find_job(a.id).await.unwrap().unwrap();
    assert_eq!(found.payload, "a");
    assert_eq!(found.queue, "default");
}

pub(crate) async fn next_job_by_priority(store: &dyn QueueStore) {
    for (payload, priority) in [("p5", 5), ("p1", 1), ("p9", 9)] {
        store.add_job(QueuedJob::new("default", payload, priority)).await.unwrap();
    }
    store.add_job(QueuedJob::new("other", "p100", 100)).await.unwrap();

    let next = store.get_next_job("default", 3, None).await.unwrap().unwrap();
    assert_eq!(next.payload, "p9");
}

pub(crate) async fn next_job_tie_breaks_on_lowest_id(store: &dyn QueueStore) {
    let first = store.add_job(QueuedJob::new("default", "first", 2)).await.unwrap();
    store.add_job(QueuedJob::new("default", "second", 2)).await.unwrap();

    let next = store.get_next_job("default", 3, None).await.unwrap().unwrap();
    assert_eq!(next.id, first.id);
}

pub(crate) async fn next_job_skips_reserved_and_exhausted(store: &dyn QueueStore) {
    let mut reserved = store.add_job(QueuedJob::new("default", "reserved", 9)).await.unwrap();
    reserved.reserved_at = Some(Utc::now());
    store.update_job(&reserved).await.unwrap();

    let mut exhausted = store.add_job(QueuedJob::new("default", "exhausted", 8)).await.unwrap();
    exhausted.attempts = 4;
    store.update_job(&exhausted).await.unwrap();

    let mut at_limit = store.add_job(QueuedJob::new("default", "at-limit", 1)).await.unwrap();
    at_limit.attempts = 3;
    store.update_job(&at_limit).await.unwrap();

    let next = store.get_next_job("default", 3, None).await.unwrap().unwrap();
    assert_eq!(next.payload, "at-limit");
}

// The guard refuses any reservation while the caller holds a job; it is not a
// filter excluding that one id. A per-row exclusion would return "other" here.
pub(crate) async fn next_job_guard_blocks_when_holding(store: &dyn QueueStore) {
    let held = store.add_job(QueuedJob::new("default", "held", 0)).await.unwrap();
    store.add_job(QueuedJob::new("default", "other", 0)).await.unwrap();

    let next = store.get_next_job("default", 3, Some(held.id)).await.unwrap();
    assert!(next.is_none());
}

pub(crate) async fn empty_queue_name_returns_first_row(store: &dyn QueueStore) {
    let mut first = store.add_job(QueuedJob::new("encoder", "first", 0)).await.unwrap();
    first.reserved_at = Some(Utc::now());
    store.update_job(&first).await.unwrap();
    store.add_job(QueuedJob::new("default", "second", 10)).await.unwrap();

    let next = store.get_next_job("", 3, None).await.unwrap().unwrap();
    assert_eq!(next.id, first.id);
}

pub(crate) async fn job_exists_by_payload(store: &dyn QueueStore) {
    store.add_job(QueuedJob::new("default", r#"{"type":"a"}"#, 0)).await.unwrap();
    assert!(store.job_exists(r#"{"type":"a"}"#).await.unwrap());
    assert!(!store.job_exists(r#"{"type":"b"}"#).await.unwrap());
}

pub(crate) async fn update_and_reset(store: &dyn QueueStore) {
    let mut a = store.add_job(QueuedJob::new("default", "a", 0)).await.unwrap();
    let mut b = store.add_job(QueuedJob::new("default", "b", 0)).await.unwrap();
    store.add_job(QueuedJob::new("default", "c", 0)).await.unwrap();

    for job in [&mut a, &mut b] {
        job.reserved_at = Some(Utc::now());
        job.attempts = 1;
        store.update_job(job).await.unwrap();
    }

    let stored = store.find_job(a.id).await.unwrap().unwrap();
    assert!(stored.reserved_at.is_some());
    assert_eq!(stored.attempts, 1);

    assert_eq!(store.reset_all_reserved_jobs().await.unwrap(), 2);
    let stored = store.find_job(a.id).await.unwrap().unwrap();
    assert!(stored.reserved_at.is_none());
    assert_eq!(stored.attempts, 1);
}

pub(crate) async fn remove_and_count(store: &dyn QueueStore) {
    let a = store.add_job(QueuedJob::new("default", "a", 0)).await.unwrap();
    store.add_job(QueuedJob::new("encoder", "b", 0)).await.unwrap();

    assert_eq!(store.count_jobs(None).await.unwrap(), 2);
    assert_eq!(store.count_jobs(Some("encoder")).await.unwrap(), 1);

    store.remove_job(a.id).await.unwrap();
    store.remove_job(a.id).await.unwrap();
    assert!(store.find_job(a.id).await.unwrap().is_none());
    assert_eq!(store.count_jobs(None).await.unwrap(), 1);
}

pub(crate) async fn failed_job_lifecycle(store: &dyn QueueStore) {
    let job = QueuedJob::new("encoder", "payload", 0);
    let first = store
        .add_failed_job(FailedJob::from_job(&job, "database", "boom"))
        .await
        .unwrap();
    let second = store
        .add_failed_job(FailedJob::from_job(&job, "database", "bang"))
        .await
        .unwrap();

    let found = store.find_failed_job(first.id).await.unwrap().unwrap();
    assert_eq!(found.uuid, first.uuid);
    assert_eq!(found.exception, "boom");
    assert_eq!(found.connection, "database");

    assert_eq!(store.get_failed_jobs(None).await.unwrap().len(), 2);
    let only = store.get_failed_jobs(Some(second.id)).await.unwrap();
    assert_eq!(only.len(), 1);
    assert_eq!(only[0].exception, "bang");

    store.remove_failed_job(first.id).await.unwrap();
    assert!(store.find_failed_job(first.id).await.unwrap().is_none());
}

pub(crate) async fn move_and_restore_failed(store: &dyn QueueStore) {
    let job = store.add_job(QueuedJob::new("encoder", "payload", 3)).await.unwrap();
    let failed = store
        .move_to_failed(job.id, FailedJob::from_job(&job, "database", "boom"))
        .await
        .unwrap();
    assert_ne!(failed.id, JobId(0));
    assert!(store.find_job(job.id).await.unwrap().is_none());
    assert_eq!(store.find_failed_job(failed.id).await.unwrap().unwrap().exception, "boom");

    let restored = store.restore_failed_job(failed.id).await.unwrap().unwrap();
    assert_eq!(restored.queue, "encoder");
    assert_eq!(restored.payload, "payload");
    assert_eq!(restored.attempts, 0);
    assert!(store.find_failed_job(failed.id).await.unwrap().is_none());
    assert_eq!(store.find_job(restored.id).await.unwrap().unwrap().payload, "payload");

    assert!(store.restore_failed_job(failed.id).await.unwrap().is_none());
}

pub(crate) async fn cron_job_lifecycle(store: &dyn QueueStore) {
    let enabled = store
        .add_cron_job(CronJob::new("cleanup", "0 3 * * *", "cleanup").with_parameters("{}"))
        .await
        .unwrap();
    store
        .add_cron_job(CronJob::new("scan", "*/15 * * * *", "library-scan").disabled())
        .await
        .unwrap();

    let duplicate = store.add_cron_job(CronJob::new("cleanup", "* * * * *", "x")).await;
    assert!(duplicate.is_err());

    let listed = store.get_enabled_cron_jobs().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "cleanup");
    assert_eq!(store.get_cron_jobs().await.unwrap().len(), 2);

    let mut row = store.find_cron_job_by_name("cleanup").await.unwrap().unwrap();
    assert_eq!(row.id, enabled.id);
    let ran_at = Utc::now();
    row.mark_run(ran_at, Some(ran_at + chrono::Duration::days(1)));
    store.update_cron_job(&row).await.unwrap();

    let row = store.find_cron_job_by_name("cleanup").await.unwrap().unwrap();
    assert_eq!(row.last_run.map(|t| t.timestamp()), Some(ran_at.timestamp()));
    assert!(row.next_run.is_some());

    store.remove_cron_job(row.id).await.unwrap();
    assert!(store.find_cron_job_by_name("cleanup").await.unwrap().is_none());
}

pub(crate) async fn configuration_values(store: &dyn ConfigurationStore) {
    assert!(!store.has_key("encoderRunners").await.unwrap());
    assert!(store.get_value("encoderRunners").await.unwrap().is_none());

    store.set_value("encoderRunners", "2").await.unwrap();
    assert!(store.has_key("encoderRunners").await.unwrap());
    assert_eq!(store.get_value("encoderRunners").await.unwrap().as_deref(), Some("2"));

    store.set_value_by("encoderRunners", "5", Some("admin")).await.unwrap();
    assert_eq!(store.get_value("encoderRunners").await.unwrap().as_deref(), Some("5"));
}
