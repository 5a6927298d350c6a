use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::JobId;
use crate::QueueError;

/// Queue metadata as stored under `store_key(prefix, name)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub name: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl QueueRecord {
    pub fn new(name: impl Into<String>, target: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            // an empty secret means "unsigned"
            secret: secret.filter(|s| !s.is_empty()),
        }
    }
}

/// Coarse job status mirrored into the KV store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Enqueued and not yet picked up by a worker
    Ready,
    /// Delivery failed; retained as a dead-letter entry
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(Self::Ready),
            "ERROR" => Ok(Self::Error),
            other => Err(QueueError::Serialization(format!("unknown job status: {other}"))),
        }
    }
}

/// Value stored under a READY or ERROR job key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub id: JobId,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One row of a job listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub status: JobStatus,
    pub job: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobView {
    pub fn from_entry(status: JobStatus, entry: StatusEntry) -> Self {
        Self {
            id: entry.id,
            status,
            job: entry.data,
            error: entry.error,
        }
    }
}
