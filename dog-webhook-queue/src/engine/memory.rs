use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::{
    EngineError, EngineJob, JobId, JobState,
    engine::{EngineResult, QueueEngine},
    config::DEFAULT_FAILED_TTL,
};

/// Completed jobs kept for inspection
pub const DEFAULT_KEEP_COMPLETED: usize = 100;

#[derive(Default)]
struct EngineState {
    jobs: HashMap<JobId, EngineJob>,
    /// FIFO of waiting job ids
    waiting: VecDeque<JobId>,
    /// Completion order, oldest first, for retention
    completed: VecDeque<JobId>,
}

/// In-memory job engine for testing and development
#[derive(Clone)]
pub struct MemoryEngine {
    state: Arc<RwLock<EngineState>>,
    closed: Arc<AtomicBool>,
    keep_completed: usize,
    failed_ttl: Duration,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_KEEP_COMPLETED, DEFAULT_FAILED_TTL)
    }

    /// Keep the newest `keep_completed` completed jobs and drop failed jobs
    /// older than `failed_ttl`
    pub fn with_retention(keep_completed: usize, failed_ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(EngineState::default())),
            closed: Arc::new(AtomicBool::new(false)),
            keep_completed,
            failed_ttl,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Engine-side record of a job, for inspection
    pub fn job(&self, job_id: &JobId) -> Option<EngineJob> {
        self.state.read().jobs.get(job_id).cloned()
    }

    /// Number of jobs waiting for a worker
    pub fn waiting_len(&self) -> usize {
        self.state.read().waiting.len()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.is_closed() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn prune_failed(&self, state: &mut EngineState) {
        let Ok(ttl) = chrono::Duration::from_std(self.failed_ttl) else {
            return;
        };
        let cutoff = Utc::now() - ttl;
        state.jobs.retain(|_, job| {
            !(job.state == JobState::Failed && job.finished_at.is_some_and(|at| at < cutoff))
        });
    }

    fn finish(&self, job_id: &JobId, outcome: impl FnOnce(&mut EngineJob)) -> EngineResult<()> {
        let mut state = self.state.write();
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))?;
        if job.state != JobState::Active {
            return Err(EngineError::Internal(format!("job {job_id} is not active")));
        }
        outcome(job);
        let finished = job.state;

        if finished == JobState::Completed {
            state.completed.push_back(job_id.clone());
            while state.completed.len() > self.keep_completed {
                if let Some(old) = state.completed.pop_front() {
                    state.jobs.remove(&old);
                }
            }
        } else {
            self.prune_failed(&mut state);
        }
        Ok(())
    }
}

#[async_trait]
impl QueueEngine for MemoryEngine {
    async fn enqueue(&self, name: &str, data: Value, job_id: JobId) -> EngineResult<EngineJob> {
        self.ensure_open()?;
        let mut state = self.state.write();
        if state.jobs.contains_key(&job_id) {
            return Err(EngineError::DuplicateJob(job_id.to_string()));
        }

        let job = EngineJob::new(job_id.clone(), name, data);
        state.jobs.insert(job_id.clone(), job.clone());
        state.waiting.push_back(job_id);
        Ok(job)
    }

    async fn dequeue(&self) -> EngineResult<Option<EngineJob>> {
        self.ensure_open()?;
        let mut state = self.state.write();
        while let Some(job_id) = state.waiting.pop_front() {
            // removed jobs leave stale ids behind
            if let Some(job) = state.jobs.get_mut(&job_id) {
                if job.state == JobState::Waiting {
                    job.activate();
                    debug!(job_id = %job_id, attempts = job.attempts, "job leased");
                    return Ok(Some(job.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn ack_complete(&self, job_id: &JobId) -> EngineResult<()> {
        self.finish(job_id, EngineJob::complete)
    }

    async fn ack_fail(&self, job_id: &JobId, reason: &str) -> EngineResult<()> {
        self.finish(job_id, |job| job.fail(reason.to_string()))
    }

    async fn list_jobs(&self, name: &str, states: &[JobState]) -> EngineResult<Vec<EngineJob>> {
        let mut jobs: Vec<EngineJob> = self
            .state
            .read()
            .jobs
            .values()
            .filter(|job| job.name == name && states.contains(&job.state))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn remove_job(&self, job_id: &JobId) -> EngineResult<()> {
        let mut state = self.state.write();
        match state.jobs.get(job_id).map(|job| job.state) {
            None | Some(JobState::Active) => Err(EngineError::JobNotFound(job_id.to_string())),
            Some(_) => {
                state.jobs.remove(job_id);
                state.waiting.retain(|id| id != job_id);
                state.completed.retain(|id| id != job_id);
                Ok(())
            }
        }
    }

    async fn close(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
