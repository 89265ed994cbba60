//! Fire-and-forget job submission.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::job::QueuedJob;
use crate::payload::{QueueableJob, encode};
use crate::queue::JobQueue;

/// Encodes jobs and puts them on the queue.
///
/// Submission never fails from the caller's point of view: encoding and
/// store errors are logged and the job is dropped. The returned row is for
/// callers that want to know what happened.
#[derive(Clone)]
pub struct JobDispatcher {
    queue: Arc<JobQueue>,
}

impl JobDispatcher {
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self { queue }
    }

    /// Dispatch to the job's own queue and priority.
    pub async fn dispatch<J: QueueableJob>(&self, job: &J) -> Option<QueuedJob> {
        self.dispatch_to(job, job.queue_name(), job.priority()).await
    }

    /// Dispatch to an explicit queue and priority.
    pub async fn dispatch_to<J: QueueableJob>(
        &self,
        job: &J,
        queue: &str,
        priority: i32,
    ) -> Option<QueuedJob> {
        let payload = match encode(job) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(job_type = J::JOB_TYPE, error = %e, "Failed to encode job");
                return None;
            }
        };

        match self.queue.enqueue(QueuedJob::new(queue, payload, priority)).await {
            Ok(Some(row)) => {
                debug!(job_type = J::JOB_TYPE, queue, job_id = %row.id, "Dispatched job");
                Some(row)
            }
            Ok(None) => None,
            Err(e) => {
                error!(job_type = J::JOB_TYPE, queue, error = %e, "Failed to dispatch job");
                None
            }
        }
    }
}
