pub mod memory;
pub mod pagination;

#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::QueueResult;

pub use pagination::Pagination;

/// Cursor value that starts a scan and signals its completion
pub const SCAN_DONE: &str = "0";

/// Key-value primitives the adapter needs from its store.
///
/// Implementations must be safe for concurrent use; every method is a
/// single round trip and atomic per key.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read one value
    async fn get(&self, key: &str) -> QueueResult<Option<String>>;

    /// Write one value, expiring after `ttl` when given
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> QueueResult<()>;

    /// Delete keys, returning how many existed. Missing keys are not an error.
    async fn del(&self, keys: &[String]) -> QueueResult<u64>;

    /// Read many values; the result is positionally aligned with `keys`
    async fn mget(&self, keys: &[String]) -> QueueResult<Vec<Option<String>>>;

    /// One SCAN step: returns the next cursor and the keys matched in this step.
    /// A returned cursor of `"0"` means the iteration is complete.
    async fn scan(&self, cursor: &str, pattern: &str, count: usize) -> QueueResult<(String, Vec<String>)>;

    /// Release connections held by the store. Called once on adapter shutdown.
    async fn close(&self) -> QueueResult<()> {
        Ok(())
    }
}
