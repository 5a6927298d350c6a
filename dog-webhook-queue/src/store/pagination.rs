//! Bounded, iterative access to large key sets.
//!
//! A single SCAN/MGET/DEL over an unbounded key set would block the store,
//! so every operation here walks the set in fixed-size pages.

use std::collections::BTreeSet;
use std::sync::Arc;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{QueueResult, store::{KvStore, SCAN_DONE}};

pub const DEFAULT_SCAN_PAGE_SIZE: usize = 50;
pub const DEFAULT_BATCH_PAGE_SIZE: usize = 100;

/// Paged scan, multi-get and delete over a shared store
#[derive(Clone)]
pub struct Pagination {
    store: Arc<dyn KvStore>,
    scan_page_size: usize,
    batch_page_size: usize,
}

impl Pagination {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_page_sizes(store, DEFAULT_SCAN_PAGE_SIZE, DEFAULT_BATCH_PAGE_SIZE)
    }

    /// Page sizes of 0 are clamped to 1
    pub fn with_page_sizes(store: Arc<dyn KvStore>, scan_page_size: usize, batch_page_size: usize) -> Self {
        Self {
            store,
            scan_page_size: scan_page_size.max(1),
            batch_page_size: batch_page_size.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// All keys matching `matcher`, sorted and de-duplicated.
    ///
    /// Keys written or removed while the scan runs may or may not appear.
    pub async fn scan_keys(&self, matcher: &str) -> QueueResult<Vec<String>> {
        let mut keys = BTreeSet::new();
        let mut cursor = SCAN_DONE.to_string();
        let mut pages = 0usize;

        loop {
            let (next, page) = self.store.scan(&cursor, matcher, self.scan_page_size).await?;
            keys.extend(page);
            pages += 1;
            if next == SCAN_DONE {
                break;
            }
            cursor = next;
        }

        debug!(matcher, pages, found = keys.len(), "scan complete");
        Ok(keys.into_iter().collect())
    }

    /// Fetch and parse the values of `keys`, one MGET per page.
    /// Keys with no value (deleted or expired meanwhile) are skipped.
    pub async fn batch_get<T: DeserializeOwned>(&self, keys: &[String]) -> QueueResult<Vec<T>> {
        let mut values = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(self.batch_page_size) {
            for raw in self.store.mget(chunk).await?.into_iter().flatten() {
                values.push(serde_json::from_str(&raw)?);
            }
        }
        Ok(values)
    }

    /// Delete `keys`, one DEL per page. Returns how many keys existed.
    pub async fn batch_delete(&self, keys: &[String]) -> QueueResult<u64> {
        let mut removed = 0;
        for chunk in keys.chunks(self.batch_page_size) {
            removed += self.store.del(chunk).await?;
        }
        Ok(removed)
    }
}
