use serde::{Deserialize, Serialize};

use super::{JobId, JobView};
use crate::QueueError;

/// Structured result returned by every facade operation.
///
/// Serializes untagged: `{ "ok": true, ... }` on success,
/// `{ "ok": false, "status": 404, "msg": "..." }` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Queues { ok: bool, queues: Vec<String> },
    Id { ok: bool, id: JobId },
    Jobs { ok: bool, jobs: Vec<JobView> },
    Err { ok: bool, status: u16, msg: String },
    Ok { ok: bool },
}

impl Envelope {
    pub fn ok() -> Self {
        Self::Ok { ok: true }
    }

    pub fn queues(queues: Vec<String>) -> Self {
        Self::Queues { ok: true, queues }
    }

    pub fn id(id: JobId) -> Self {
        Self::Id { ok: true, id }
    }

    pub fn jobs(jobs: Vec<JobView>) -> Self {
        Self::Jobs { ok: true, jobs }
    }

    pub fn error(err: &QueueError) -> Self {
        Self::Err {
            ok: false,
            status: err.status_code(),
            msg: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            Self::Queues { ok, .. }
            | Self::Id { ok, .. }
            | Self::Jobs { ok, .. }
            | Self::Err { ok, .. }
            | Self::Ok { ok } => *ok,
        }
    }

    /// Error status, if this is an error envelope
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Err { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl<T: Into<Envelope>> From<Result<T, QueueError>> for Envelope {
    fn from(result: Result<T, QueueError>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => Self::error(&err),
        }
    }
}

impl From<()> for Envelope {
    fn from(_: ()) -> Self {
        Self::ok()
    }
}

impl From<JobId> for Envelope {
    fn from(id: JobId) -> Self {
        Self::id(id)
    }
}

impl From<Vec<JobView>> for Envelope {
    fn from(jobs: Vec<JobView>) -> Self {
        Self::jobs(jobs)
    }
}
