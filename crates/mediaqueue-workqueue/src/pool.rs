//! Worker pool manager.
//!
//! Keeps a set of [`Worker`]s per named queue. The desired count of a queue
//! is persisted in the [`ConfigurationStore`] under `"<queue>Runners"` so
//! that operator changes survive a restart.
//!
//! Growing a pool is active: a ramp-up task starts one worker per
//! `ramp_up_delay` until the target is met. Shrinking is passive: a worker
//! that finishes a cycle while its pool is over target retires itself, so a
//! running job is never cut short.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::QueueError;
use crate::job::JobId;
use crate::payload::JobRegistry;
use crate::queue::JobQueue;
use crate::readiness::ReadinessSignal;
use crate::store::{ConfigurationStore, runners_key};
use crate::worker::{WorkCycleListener, Worker, WorkerSettings, WorkerState};

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;

/// Point-in-time view of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub queue: String,
    pub index: usize,
    pub state: WorkerState,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub current_job: Option<JobId>,
}

struct QueuePool {
    default_count: usize,
    target: usize,
    workers: BTreeMap<usize, Arc<Worker>>,
    /// Bumped on every resize; a ramp-up task quits once it is stale.
    generation: u64,
}

impl QueuePool {
    fn new(default_count: usize) -> Self {
        Self {
            default_count,
            target: default_count,
            workers: BTreeMap::new(),
            generation: 0,
        }
    }

    /// Workers whose loop is alive. Stopped workers stay registered but do
    /// not count towards the target.
    fn running(&self) -> usize {
        self.workers.values().filter(|w| w.is_running()).count()
    }

    /// Drop stopped workers. Returns how many were removed.
    fn prune_stopped(&mut self) -> usize {
        let before = self.workers.len();
        self.workers.retain(|_, w| w.is_running());
        before - self.workers.len()
    }

    fn lowest_free_index(&self) -> usize {
        (0..=self.workers.len())
            .find(|i| !self.workers.contains_key(i))
            .unwrap_or(self.workers.len())
    }
}

struct PoolInner {
    job_queue: Arc<JobQueue>,
    registry: Arc<JobRegistry>,
    settings: Arc<dyn ConfigurationStore>,
    worker_settings: WorkerSettings,
    pools: Mutex<BTreeMap<String, QueuePool>>,
    readiness: ReadinessSignal,
}

impl PoolInner {
    fn spawn_worker(self: &Arc<Self>, name: &str, pool: &mut QueuePool) {
        let index = pool.lowest_free_index();
        let listener: Arc<dyn WorkCycleListener> = self.clone();
        let worker = Arc::new(
            Worker::new(
                name,
                index,
                self.job_queue.clone(),
                self.registry.clone(),
                self.worker_settings.clone(),
            )
            .with_listener(Arc::downgrade(&listener)),
        );
        worker.start();
        pool.workers.insert(index, worker);
        debug!(queue = name, index, live = pool.workers.len(), "Spawned worker");
    }

    async fn ramp_up(self: Arc<Self>, name: String, generation: u64) {
        loop {
            {
                let mut pools = self.pools.lock();
                let Some(pool) = pools.get_mut(&name) else {
                    return;
                };
                if pool.generation != generation {
                    debug!("Ramp-up superseded");
                    return;
                }
                let running = pool.running();
                if running >= pool.target {
                    debug!(live = running, "Ramp-up complete");
                    return;
                }
                self.spawn_worker(&name, pool);
            }
            sleep(self.worker_settings.ramp_up_delay).await;
        }
    }

    async fn resolve_target(&self, name: &str, default_count: usize) -> usize {
        let key = runners_key(name);
        match self.settings.get_value(&key).await {
            Ok(Some(value)) => match value.trim().parse::<usize>() {
                Ok(count) => count,
                Err(_) => {
                    warn!(key = %key, value = %value, "Ignoring unparseable worker count");
                    default_count
                }
            },
            Ok(None) => default_count,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read worker count");
                default_count
            }
        }
    }

    fn workers_of(&self, name: &str) -> Result<Vec<Arc<Worker>>, QueueError> {
        let pools = self.pools.lock();
        let pool = pools
            .get(name)
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))?;
        Ok(pool.workers.values().cloned().collect())
    }
}

impl WorkCycleListener for PoolInner {
    fn cycle_completed(&self, worker: &Worker) -> bool {
        let mut pools = self.pools.lock();
        let Some(pool) = pools.get_mut(worker.queue_name()) else {
            return false;
        };

        let registered = pool
            .workers
            .get(&worker.index())
            .is_some_and(|w| std::ptr::eq(w.as_ref(), worker));
        if !registered {
            return false;
        }

        if pool.running() <= pool.target {
            return true;
        }

        let pruned = pool.prune_stopped();
        if pruned > 0 {
            debug!(queue = worker.queue_name(), pruned, "Dropped stopped workers");
        }
        if pool.running() <= pool.target {
            return true;
        }

        pool.workers.remove(&worker.index());
        info!(
            queue = worker.queue_name(),
            index = worker.index(),
            live = pool.running(),
            target = pool.target,
            "Retiring worker"
        );
        false
    }
}

/// Owns the worker pools of every queue.
#[derive(Clone)]
pub struct WorkerPoolManager {
    inner: Arc<PoolInner>,
}

impl WorkerPoolManager {
    /// Create a manager for `queues` (queue name to default worker count).
    /// No worker runs until [`WorkerPoolManager::initialize`].
    pub fn new(
        job_queue: Arc<JobQueue>,
        registry: Arc<JobRegistry>,
        settings: Arc<dyn ConfigurationStore>,
        queues: &BTreeMap<String, usize>,
        worker_settings: WorkerSettings,
    ) -> Self {
        let pools = queues
            .iter()
            .map(|(name, count)| (name.clone(), QueuePool::new(*count)))
            .collect();

        Self {
            inner: Arc::new(PoolInner {
                job_queue,
                registry,
                settings,
                worker_settings,
                pools: Mutex::new(pools),
                readiness: ReadinessSignal::new(),
            }),
        }
    }

    /// Reclaim reservations left by a previous process, start every pool at
    /// its persisted (or default) size, then fire the readiness signal.
    pub async fn initialize(&self) -> Result<(), QueueError> {
        if self.inner.readiness.is_ready() {
            warn!("Worker pools already initialized");
            return Ok(());
        }

        self.inner.job_queue.reset_all_reserved_jobs().await?;

        let defaults: Vec<(String, usize)> = {
            let pools = self.inner.pools.lock();
            pools.iter().map(|(name, pool)| (name.clone(), pool.default_count)).collect()
        };

        for (name, default_count) in defaults {
            let target = self.inner.resolve_target(&name, default_count).await;
            {
                let mut pools = self.inner.pools.lock();
                if let Some(pool) = pools.get_mut(&name) {
                    pool.target = target;
                    while pool.workers.len() < target {
                        self.inner.spawn_worker(&name, pool);
                    }
                }
            }
            info!(queue = %name, workers = target, "Worker pool started");
        }

        self.inner.readiness.fire();
        info!("Worker pools ready");
        Ok(())
    }

    /// Signal fired once [`WorkerPoolManager::initialize`] has finished.
    pub fn readiness(&self) -> ReadinessSignal {
        self.inner.readiness.clone()
    }

    /// Start every worker of a queue.
    pub fn start(&self, name: &str) -> Result<(), QueueError> {
        for worker in self.inner.workers_of(name)? {
            worker.start();
        }
        info!(queue = name, "Worker pool started");
        Ok(())
    }

    /// Stop every worker of a queue and wait for running jobs to finish.
    /// A ramp-up in progress is cancelled; stopped workers stay registered
    /// until the next resize.
    pub async fn stop(&self, name: &str) -> Result<(), QueueError> {
        let workers = {
            let mut pools = self.inner.pools.lock();
            let pool = pools
                .get_mut(name)
                .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))?;
            pool.generation += 1;
            pool.workers.values().cloned().collect::<Vec<_>>()
        };
        join_all(workers.iter().map(|w| w.stop_when_ready())).await;
        info!(queue = name, "Worker pool stopped");
        Ok(())
    }

    /// Restart every worker of a queue.
    pub async fn restart(&self, name: &str) -> Result<(), QueueError> {
        let workers = self.inner.workers_of(name)?;
        join_all(workers.iter().map(|w| w.restart())).await;
        info!(queue = name, "Worker pool restarted");
        Ok(())
    }

    /// Stop every worker of every queue and wait for them.
    pub async fn shutdown(&self) {
        let workers: Vec<Arc<Worker>> = {
            let mut pools = self.inner.pools.lock();
            pools
                .values_mut()
                .flat_map(|pool| {
                    pool.generation += 1;
                    pool.workers.values().cloned().collect::<Vec<_>>()
                })
                .collect()
        };

        info!(workers = workers.len(), "Shutting down worker pools");
        join_all(workers.iter().map(|w| w.stop_when_ready())).await;
        info!("Worker pools stopped");
    }

    /// Change the desired worker count of a queue, creating the pool when it
    /// does not exist yet. The value is persisted under `"<queue>Runners"`
    /// and attributed to `actor`.
    pub async fn set_worker_count(
        &self,
        name: &str,
        target: usize,
        actor: Option<&str>,
    ) -> Result<(), QueueError> {
        self.inner
            .settings
            .set_value_by(&runners_key(name), &target.to_string(), actor)
            .await?;

        let generation = {
            let mut pools = self.inner.pools.lock();
            let pool = pools
                .entry(name.to_string())
                .or_insert_with(|| QueuePool::new(0));
            pool.target = target;
            pool.generation += 1;
            let pruned = pool.prune_stopped();
            info!(
                queue = name,
                live = pool.running(),
                pruned,
                target,
                "Worker count changed"
            );
            pool.generation
        };

        let span = info_span!("ramp_up", queue = name, target);
        tokio::spawn(
            self.inner
                .clone()
                .ramp_up(name.to_string(), generation)
                .instrument(span),
        );
        Ok(())
    }

    /// Registered workers of a queue, stopped ones included (0 for an
    /// unknown queue).
    pub fn worker_count(&self, name: &str) -> usize {
        self.inner
            .pools
            .lock()
            .get(name)
            .map_or(0, |pool| pool.workers.len())
    }

    /// Desired worker count of a queue.
    pub fn target(&self, name: &str) -> Option<usize> {
        self.inner.pools.lock().get(name).map(|pool| pool.target)
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.inner.pools.lock().keys().cloned().collect()
    }

    /// Every registered worker, ordered by queue then index.
    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        let pools = self.inner.pools.lock();
        pools
            .iter()
            .flat_map(|(name, pool)| {
                pool.workers.values().map(move |worker| WorkerSnapshot {
                    queue: name.clone(),
                    index: worker.index(),
                    state: worker.state(),
                    jobs_completed: worker.jobs_completed(),
                    jobs_failed: worker.jobs_failed(),
                    current_job: worker.current_job_id(),
                })
            })
            .collect()
    }
}
