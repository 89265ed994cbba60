//! Job payload codec and registry.
//!
//! A queued payload is a JSON envelope naming the job type and carrying the
//! job's own serialized fields:
//!
//! ```json
//! {"type": "encode-video", "data": {"file_id": 42}}
//! ```
//!
//! Job types are registered explicitly with a [`JobRegistry`] so that a worker
//! can turn a payload back into something it can run.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Default queue for jobs that do not choose one.
pub const DEFAULT_QUEUE: &str = "default";

/// A unit of work a worker can run.
#[async_trait]
pub trait ShouldQueue: Send + Sync {
    /// Queue the job is dispatched to.
    fn queue_name(&self) -> &str {
        DEFAULT_QUEUE
    }

    /// Reservation priority; higher runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Run the job. An error (or a panic) counts as a failed attempt.
    async fn handle(&self) -> anyhow::Result<()>;
}

/// A job that can be stored in the queue.
///
/// `JOB_TYPE` is written into every payload and must be unique among the
/// types registered with one [`JobRegistry`].
pub trait QueueableJob: ShouldQueue + Serialize + DeserializeOwned + 'static {
    const JOB_TYPE: &'static str;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, J> {
    #[serde(rename = "type")]
    job_type: &'a str,
    data: &'a J,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    job_type: String,
    data: serde_json::Value,
}

/// Encode a job as a payload string. Equal jobs give equal payloads.
pub fn encode<J: QueueableJob>(job: &J) -> Result<String, QueueError> {
    Ok(serde_json::to_string(&EnvelopeRef {
        job_type: J::JOB_TYPE,
        data: job,
    })?)
}

/// Read the job type of a payload without decoding the job.
pub fn job_type_of(payload: &str) -> Result<String, QueueError> {
    let envelope: Envelope = serde_json::from_str(payload)?;
    Ok(envelope.job_type)
}

type Decoder = fn(serde_json::Value) -> Result<Box<dyn ShouldQueue>, QueueError>;

fn decode_as<J: QueueableJob>(data: serde_json::Value) -> Result<Box<dyn ShouldQueue>, QueueError> {
    let job: J = serde_json::from_value(data)?;
    Ok(Box::new(job))
}

/// Maps job type names to decoders.
#[derive(Clone, Default)]
pub struct JobRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job type. Registering the same type twice is a no-op.
    pub fn register<J: QueueableJob>(&mut self) -> &mut Self {
        self.decoders.insert(J::JOB_TYPE, decode_as::<J>);
        self
    }

    /// Check if a job type is registered.
    pub fn contains(&self, job_type: &str) -> bool {
        self.decoders.contains_key(job_type)
    }

    /// Registered job type names, sorted.
    pub fn job_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.decoders.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Decode a payload into a runnable job.
    pub fn decode(&self, payload: &str) -> Result<Box<dyn ShouldQueue>, QueueError> {
        let envelope: Envelope = serde_json::from_str(payload)?;
        let decoder = self
            .decoders
            .get(envelope.job_type.as_str())
            .ok_or(QueueError::UnknownJobType(envelope.job_type))?;
        decoder(envelope.data)
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("job_types", &self.job_types())
            .finish()
    }
}
