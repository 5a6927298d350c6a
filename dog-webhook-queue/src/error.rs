use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors surfaced by the registry, the status index and the facade
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Queue Does Not Exist")]
    QueueNotFound(String),

    #[error("Queue Already Exists")]
    QueueExists(String),

    #[error("job not found")]
    JobNotFound(String),

    #[error("Invalid Queue Name")]
    InvalidQueueName(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Worker shutdown")]
    WorkerShutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Status code carried by the error envelope
    pub fn status_code(&self) -> u16 {
        match self {
            Self::QueueNotFound(_) | Self::JobNotFound(_) => 404,
            Self::QueueExists(_) => 409,
            Self::InvalidQueueName(_) => 400,
            _ => 500,
        }
    }

    /// Whether this is an expected, caller-facing outcome rather than a fault
    pub fn is_expected(&self) -> bool {
        matches!(self.status_code(), 400 | 404 | 409)
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Errors reported by the underlying job engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    #[error("Engine is closed")]
    Closed,

    #[error("Engine failure: {0}")]
    Internal(String),
}

/// Outcome of a failed webhook dispatch, reported back to the engine
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// No response at all: connection refused, DNS failure, timeout
    #[error("Transport error: {msg}")]
    Transport { msg: String, trace: Option<String> },

    /// The target answered with a non-2xx status
    #[error("Target rejected job with status {status}")]
    Rejected { status: u16, body: String },

    /// The job outlived its queue's metadata
    #[error("Queue metadata missing for {0}")]
    QueueMissing(String),

    /// Signing or status bookkeeping failed
    #[error("Dispatch failed: {0}")]
    Internal(#[from] QueueError),
}

impl DeliveryError {
    /// Text recorded on the ERROR entry for this failure
    pub fn error_text(&self) -> String {
        match self {
            Self::Transport { msg, trace } => {
                serde_json::json!({ "msg": msg, "stack": trace }).to_string()
            }
            Self::Rejected { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}
