//! End-to-end behaviour of the queue, pools and SQLite store together.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mediaqueue_cron::CronExpressionBuilder;
use mediaqueue_workqueue::{
    ConfigurationStore, CronJob, JobDispatcher, JobQueue, JobRegistry, QueueStore, QueueableJob,
    RetryPolicy, ShouldQueue, SqliteQueueStore, WorkerPoolManager, WorkerSettings,
};

static TRANSCODED: AtomicU32 = AtomicU32::new(0);

#[derive(Serialize, Deserialize)]
struct Transcode {
    media_id: i64,
}

#[async_trait]
impl ShouldQueue for Transcode {
    fn queue_name(&self) -> &str {
        "encoder"
    }

    async fn handle(&self) -> anyhow::Result<()> {
        TRANSCODED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl QueueableJob for Transcode {
    const JOB_TYPE: &'static str = "transcode";
}

fn settings() -> WorkerSettings {
    WorkerSettings {
        poll_interval: Duration::from_millis(10),
        cycle_pause: Duration::from_millis(5),
        ramp_up_delay: Duration::from_millis(5),
    }
}

fn manager(store: &Arc<SqliteQueueStore>, queue: &Arc<JobQueue>) -> WorkerPoolManager {
    let mut registry = JobRegistry::new();
    registry.register::<Transcode>();
    let queues = BTreeMap::from([("encoder".to_string(), 1)]);
    WorkerPoolManager::new(queue.clone(), Arc::new(registry), store.clone(), &queues, settings())
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reserved_job_survives_crash_and_runs_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    // First process: dispatch, reserve, then die without finishing.
    {
        let store = Arc::new(SqliteQueueStore::open(&path).await.unwrap());
        let queue =
            Arc::new(JobQueue::new(store.clone()).with_retry_policy(RetryPolicy::immediate(3)));
        let dispatcher = JobDispatcher::new(queue.clone());

        dispatcher.dispatch(&Transcode { media_id: 1 }).await.unwrap();
        assert!(dispatcher.dispatch(&Transcode { media_id: 1 }).await.is_none());
        dispatcher.dispatch(&Transcode { media_id: 2 }).await.unwrap();

        let held = queue.reserve_job("encoder", None).await.unwrap();
        assert_eq!(held.attempts, 1);
        store.set_value_by("encoderRunners", "2", Some("admin")).await.unwrap();
    }

    // Second process: the pool reclaims the reservation and drains the queue.
    let store = Arc::new(SqliteQueueStore::open(&path).await.unwrap());
    let queue = Arc::new(JobQueue::new(store.clone()).with_retry_policy(RetryPolicy::immediate(3)));
    let manager = manager(&store, &queue);

    manager.initialize().await.unwrap();
    assert_eq!(manager.worker_count("encoder"), 2);

    wait_until(|| TRANSCODED.load(Ordering::SeqCst) == 2).await;
    manager.shutdown().await;

    assert_eq!(store.count_jobs(None).await.unwrap(), 0);
    assert!(queue.failed_jobs(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cron_jobs_store_builder_expressions() {
    let store = SqliteQueueStore::in_memory().await.unwrap();

    let nightly = CronExpressionBuilder::new().daily(3, 0).unwrap().build();
    let weekdays = CronExpressionBuilder::new().weekdays().build();

    store
        .add_cron_job(CronJob::new("library-scan", nightly, "scan-library"))
        .await
        .unwrap();
    store
        .add_cron_job(CronJob::new("digest", weekdays, "send-digest").disabled())
        .await
        .unwrap();

    let enabled = store.get_enabled_cron_jobs().await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].cron_expression, "0 3 * * *");

    let digest = store.find_cron_job_by_name("digest").await.unwrap().unwrap();
    assert_eq!(digest.cron_expression, "0 0 * * 1-5");
    assert!(!digest.is_enabled);
}
