//! READY/ERROR mirror of job state, kept in the KV store so jobs can be
//! listed and expired without engine-specific queries.
//!
//! Per (queue, job id) at most one entry exists: READY while the job waits,
//! nothing while it is being delivered, ERROR (with a TTL) after a failed
//! delivery.

use std::time::Duration;
use serde_json::Value;
use tracing::debug;

use crate::{
    QueueResult, JobId, JobStatus, JobView, StatusEntry,
    keys,
    registry::QueueRegistry,
    store::Pagination,
};

#[derive(Clone)]
pub struct JobStatusIndex {
    prefix: String,
    pages: Pagination,
    registry: QueueRegistry,
}

impl JobStatusIndex {
    pub fn new(prefix: impl Into<String>, pages: Pagination, registry: QueueRegistry) -> Self {
        Self {
            prefix: prefix.into(),
            pages,
            registry,
        }
    }

    fn key(&self, name: &str, status: JobStatus, id: &JobId) -> String {
        keys::job_key(&self.prefix, name, status, id.as_str())
    }

    /// Record a freshly enqueued job
    pub async fn mark_ready(&self, name: &str, id: &JobId, data: &Value) -> QueueResult<()> {
        let entry = StatusEntry {
            id: id.clone(),
            data: data.clone(),
            error: None,
        };
        let value = serde_json::to_string(&entry)?;
        self.pages.store().set(&self.key(name, JobStatus::Ready, id), &value, None).await
    }

    /// Record a failed delivery, retained for `ttl`.
    ///
    /// The READY entry must already be gone; the dispatcher clears it when
    /// the job is dequeued.
    pub async fn mark_error(
        &self,
        name: &str,
        id: &JobId,
        data: &Value,
        error: &str,
        ttl: Duration,
    ) -> QueueResult<()> {
        let entry = StatusEntry {
            id: id.clone(),
            data: data.clone(),
            error: Some(error.to_string()),
        };
        let value = serde_json::to_string(&entry)?;
        self.pages
            .store()
            .set(&self.key(name, JobStatus::Error, id), &value, Some(ttl))
            .await?;
        debug!(queue = name, job_id = %id, ttl_secs = ttl.as_secs(), "error entry written");
        Ok(())
    }

    /// Returns whether an entry was removed
    pub async fn clear_ready(&self, name: &str, id: &JobId) -> QueueResult<bool> {
        self.clear(name, JobStatus::Ready, id).await
    }

    /// Returns whether an entry was removed
    pub async fn clear_error(&self, name: &str, id: &JobId) -> QueueResult<bool> {
        self.clear(name, JobStatus::Error, id).await
    }

    async fn clear(&self, name: &str, status: JobStatus, id: &JobId) -> QueueResult<bool> {
        let removed = self.pages.store().del(&[self.key(name, status, id)]).await?;
        Ok(removed > 0)
    }

    /// Read one entry
    pub async fn get(&self, name: &str, status: JobStatus, id: &JobId) -> QueueResult<Option<StatusEntry>> {
        match self.pages.store().get(&self.key(name, status, id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Every entry of `status` for a queue, ordered by job id
    pub async fn list(&self, name: &str, status: JobStatus) -> QueueResult<Vec<JobView>> {
        self.registry.exists(name).await?;

        let matched = self
            .pages
            .scan_keys(&keys::job_matcher(&self.prefix, name, Some(status)))
            .await?;
        let entries: Vec<StatusEntry> = self.pages.batch_get(&matched).await?;

        let mut jobs: Vec<JobView> = entries
            .into_iter()
            .map(|entry| JobView::from_entry(status, entry))
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }
}
