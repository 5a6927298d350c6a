//! # dog-webhook-queue: named webhook queues
//!
//! Turns a durable job engine and a key-value store into named queues whose
//! jobs are POSTed to a per-queue webhook target:
//!
//! - **Queues** carry a `target` URL and an optional HMAC `secret`
//! - **Jobs** are arbitrary JSON, listed as `READY` until a worker picks them
//!   up and as `ERROR` (dead-letter, with a TTL) when delivery fails
//! - **Retry** re-enqueues a dead-lettered payload under a fresh id,
//!   **cancel** pulls a job that has not been picked up yet
//! - Every key of a queue shares one cluster hash-tag, so bulk scans and
//!   deletes stay on one partition
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use dog_webhook_queue::prelude::*;
//!
//! # async fn run() -> QueueResult<()> {
//! let config = AdapterConfig::new("memory://local").with_concurrency(4);
//! let adapter = WebhookQueueAdapter::start(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryEngine::new()),
//!     Arc::new(HttpWebhookClient::new(config.delivery_timeout)?),
//!     config,
//! )?;
//!
//! adapter.create("foobar", "http://localhost:3000/hooks", Some("s3cret".into())).await;
//! let posted = adapter.post("foobar", serde_json::json!({ "type": "FOOBAR" })).await;
//! assert!(posted.is_ok());
//!
//! adapter.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod index;
pub mod keys;
pub mod observability;
pub mod registry;
pub mod store;
pub mod types;
pub mod worker;

pub use adapter::WebhookQueueAdapter;
pub use config::{AdapterConfig, RedisUrl};
pub use error::{QueueError, QueueResult, EngineError, DeliveryError};
pub use types::{
    JobId, QueueRecord, JobStatus, StatusEntry, JobView, EngineJob, JobState, Envelope,
};
pub use dispatch::{Dispatcher, HttpWebhookClient, WebhookClient, WebhookRequest, WebhookResponse};
pub use engine::QueueEngine;
pub use engine::memory::MemoryEngine;
pub use store::KvStore;
pub use store::memory::MemoryStore;
pub use observability::{LiveMetrics, MetricsSnapshot};

#[cfg(feature = "redis")]
pub use store::redis::RedisStore;

#[cfg(feature = "tracing-basic")]
pub use observability::init_tracing;

/// Everything needed to wire up and drive an adapter
pub mod prelude {
    pub use crate::{
        WebhookQueueAdapter, AdapterConfig, Envelope,
        QueueError, QueueResult, JobId, JobStatus, JobView,
    };

    // Seams and their bundled implementations
    pub use crate::{
        KvStore, MemoryStore, QueueEngine, MemoryEngine, WebhookClient, HttpWebhookClient,
    };

    #[cfg(feature = "redis")]
    pub use crate::RedisStore;

    pub use async_trait::async_trait;
}
