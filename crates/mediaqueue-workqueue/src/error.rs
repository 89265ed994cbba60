//! Queue errors.

use thiserror::Error;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No worker pool is registered under this queue name.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// Transient storage failure, worth retrying.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Connection or relational failure (closed connection, constraint
    /// violation). Retrying the same call will not help.
    #[error("Relational error: {0}")]
    Relational(String),

    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload names a job type nobody registered.
    #[error("Unknown job type: {0}")]
    UnknownJobType(String),
}

impl QueueError {
    /// Whether a store operation that failed with this error should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Storage(_))
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;
