//! Queue worker.
//!
//! A [`Worker`] runs one loop on its own tokio task: reserve a job from its
//! queue, run it, delete it on success or record the failure, pause, repeat.
//! Stopping is cooperative. A stop request is seen between steps, never in the
//! middle of a running handler.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use mediaqueue_config::WorkerConfig;

use crate::job::{JobId, QueuedJob};
use crate::payload::JobRegistry;
use crate::queue::JobQueue;

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

/// Worker loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Pausing between cycles, or not yet started.
    Idle,
    /// Asking the queue for a job.
    Reserving,
    /// Running a job handler.
    Executing,
    /// Loop has exited.
    Stopped,
}

/// Timing of the worker loop.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Pause after a reservation that found nothing.
    pub poll_interval: Duration,
    /// Pause after a job ran.
    pub cycle_pause: Duration,
    /// Delay between workers started by a pool resize.
    pub ramp_up_delay: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            cycle_pause: config.cycle_pause(),
            ramp_up_delay: config.ramp_up_delay(),
        }
    }
}

/// Told about every finished worker cycle.
pub trait WorkCycleListener: Send + Sync {
    /// Called after each cycle, while the worker holds no job.
    /// Returning `false` ends the worker's loop.
    fn cycle_completed(&self, worker: &Worker) -> bool;
}

/// A single queue worker.
pub struct Worker {
    queue_name: String,
    index: usize,
    job_queue: Arc<JobQueue>,
    registry: Arc<JobRegistry>,
    settings: WorkerSettings,
    listener: Option<Weak<dyn WorkCycleListener>>,
    state: Mutex<WorkerState>,
    current_job: Mutex<Option<JobId>>,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    cancel: Mutex<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Create a worker for `queue_name`. It does nothing until started.
    pub fn new(
        queue_name: impl Into<String>,
        index: usize,
        job_queue: Arc<JobQueue>,
        registry: Arc<JobRegistry>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue_name: queue_name.into(),
            index,
            job_queue,
            registry,
            settings,
            listener: None,
            state: Mutex::new(WorkerState::Idle),
            current_job: Mutex::new(None),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
            handle: Mutex::new(None),
        }
    }

    /// Attach a cycle listener.
    pub fn with_listener(mut self, listener: Weak<dyn WorkCycleListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Index within the worker's pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Id of the job being executed, if any.
    pub fn current_job_id(&self) -> Option<JobId> {
        *self.current_job.lock()
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::SeqCst)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::SeqCst)
    }

    /// Check if the loop task is alive.
    pub fn is_running(&self) -> bool {
        self.handle.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the worker loop. No-op while a previous loop is still alive,
    /// including one that was asked to stop; use [`Worker::restart`] to wait
    /// for it.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!(queue = %self.queue_name, index = self.index, "Worker already running");
            return;
        }

        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.set_state(WorkerState::Idle);

        let span = info_span!("worker", queue = %self.queue_name, index = self.index);
        *handle = Some(tokio::spawn(self.clone().run(token).instrument(span)));
    }

    /// Ask the loop to stop. A running job finishes first.
    pub fn stop(&self) {
        self.cancel.lock().cancel();
    }

    /// Ask the loop to stop and wait until it has exited.
    pub async fn stop_when_ready(&self) {
        self.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(
                    queue = %self.queue_name,
                    index = self.index,
                    error = %e,
                    "Worker task failed"
                );
            }
        }
        self.set_state(WorkerState::Stopped);
    }

    /// Stop, wait for the loop to exit, start again.
    pub async fn restart(self: &Arc<Self>) {
        self.stop_when_ready().await;
        self.start();
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
    }

    async fn run(self: Arc<Self>, token: CancellationToken) {
        info!("Worker started");

        while !token.is_cancelled() {
            self.set_state(WorkerState::Reserving);
            let reserved = self
                .job_queue
                .reserve_job(&self.queue_name, self.current_job_id())
                .await;

            let pause = match reserved {
                Some(job) => {
                    self.execute(job).await;
                    self.settings.cycle_pause
                }
                None => self.settings.poll_interval,
            };
            self.set_state(WorkerState::Idle);

            if !self.cycle_completed() {
                info!("Worker retired");
                break;
            }
            if pause_or_cancel(&token, pause).await {
                break;
            }
        }

        self.set_state(WorkerState::Stopped);
        info!(
            completed = self.jobs_completed(),
            failed = self.jobs_failed(),
            "Worker stopped"
        );
    }

    async fn execute(&self, job: QueuedJob) {
        *self.current_job.lock() = Some(job.id);
        self.set_state(WorkerState::Executing);
        debug!(job_id = %job.id, attempts = job.attempts, "Executing job");

        match self.run_handler(&job).await {
            Ok(()) => {
                if let Err(e) = self.job_queue.delete_job(&job).await {
                    error!(job_id = %job.id, error = %e, "Failed to delete completed job");
                }
                self.jobs_completed.fetch_add(1, Ordering::SeqCst);
                debug!(job_id = %job.id, "Job completed");
            }
            Err(err) => {
                warn!(job_id = %job.id, attempts = job.attempts, "Job failed: {:#}", err);
                self.job_queue.fail_job(&job, &format!("{err:?}")).await;
                self.jobs_failed.fetch_add(1, Ordering::SeqCst);
            }
        }

        *self.current_job.lock() = None;
    }

    async fn run_handler(&self, job: &QueuedJob) -> anyhow::Result<()> {
        let handler = self.registry.decode(&job.payload)?;
        match AssertUnwindSafe(handler.handle()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!("job panicked: {}", panic_message(panic.as_ref()))),
        }
    }

    fn cycle_completed(&self) -> bool {
        match self.listener.as_ref().and_then(Weak::upgrade) {
            Some(listener) => listener.cycle_completed(self),
            None => true,
        }
    }
}

/// Sleep for `duration` unless cancelled first. Returns true when cancelled.
async fn pause_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
