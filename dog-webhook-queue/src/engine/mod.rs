pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::{EngineError, EngineJob, JobId, JobState};

/// Result type for engine primitives
pub type EngineResult<T> = Result<T, EngineError>;

/// Durable job engine primitives the adapter is layered on.
///
/// The engine owns the canonical job state; the adapter only mirrors a
/// coarse READY/ERROR view of it into the KV store.
#[async_trait]
pub trait QueueEngine: Send + Sync {
    /// Accept a job under a caller-chosen id. `name` is the owning queue.
    async fn enqueue(&self, name: &str, data: Value, job_id: JobId) -> EngineResult<EngineJob>;

    /// Hand the next waiting job to a worker, if any
    async fn dequeue(&self) -> EngineResult<Option<EngineJob>>;

    /// Record a successful delivery
    async fn ack_complete(&self, job_id: &JobId) -> EngineResult<()>;

    /// Record a failed delivery
    async fn ack_fail(&self, job_id: &JobId, reason: &str) -> EngineResult<()>;

    /// Jobs of one queue in any of `states`
    async fn list_jobs(&self, name: &str, states: &[JobState]) -> EngineResult<Vec<EngineJob>>;

    /// Remove a job that is not running. Unknown and active jobs yield `JobNotFound`.
    async fn remove_job(&self, job_id: &JobId) -> EngineResult<()>;

    /// Stop accepting work and release resources
    async fn close(&self) -> EngineResult<()>;
}
