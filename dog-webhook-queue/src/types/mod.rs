pub mod ids;
pub mod record;
pub mod job;
pub mod envelope;

pub use ids::JobId;
pub use record::{QueueRecord, JobStatus, StatusEntry, JobView};
pub use job::{EngineJob, JobState};
pub use envelope::Envelope;
