use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::JobId;

/// Engine-side job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Queued and waiting for a worker
    Waiting,
    /// Handed to a worker
    Active,
    /// Delivered successfully
    Completed,
    /// Last attempt failed
    Failed,
}

impl JobState {
    /// Check if the job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Job record owned by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineJob {
    /// Unique job identifier
    pub id: JobId,

    /// Name of the owning queue; routing key back to the queue record
    pub name: String,

    /// Payload delivered to the queue's target
    pub data: Value,

    pub state: JobState,

    /// Number of times the job has been handed to a worker
    pub attempts: u32,

    pub created_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,

    /// Last failure reason (if any)
    pub failed_reason: Option<String>,
}

impl EngineJob {
    pub fn new(id: JobId, name: impl Into<String>, data: Value) -> Self {
        Self {
            id,
            name: name.into(),
            data,
            state: JobState::Waiting,
            attempts: 0,
            created_at: Utc::now(),
            finished_at: None,
            failed_reason: None,
        }
    }

    /// Hand the job to a worker
    pub fn activate(&mut self) {
        self.state = JobState::Active;
        self.attempts += 1;
    }

    pub fn complete(&mut self) {
        self.state = JobState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: String) {
        self.state = JobState::Failed;
        self.failed_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }
}
