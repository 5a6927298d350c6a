use tracing::{debug, info, instrument};

use crate::{
    QueueResult, QueueError, QueueRecord,
    keys,
    store::Pagination,
};

/// Queue metadata stored in the KV store
#[derive(Clone)]
pub struct QueueRegistry {
    prefix: String,
    pages: Pagination,
}

impl QueueRegistry {
    pub fn new(prefix: impl Into<String>, pages: Pagination) -> Self {
        Self {
            prefix: prefix.into(),
            pages,
        }
    }

    /// Look up a queue's record
    pub async fn get(&self, name: &str) -> QueueResult<QueueRecord> {
        let key = keys::store_key(&self.prefix, name);
        match self.pages.store().get(&key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(QueueError::QueueNotFound(name.to_string())),
        }
    }

    /// Fails with `QueueNotFound` unless the queue exists
    pub async fn exists(&self, name: &str) -> QueueResult<()> {
        self.get(name).await.map(|_| ())
    }

    /// Create a queue.
    ///
    /// Names must be non-empty and free of `{` and `}`, which would end the
    /// key's hash-tag early. The existence check and the write are separate round trips, so two
    /// concurrent creates of the same name can both succeed; the last write wins.
    #[instrument(skip(self, record), fields(queue = %record.name))]
    pub async fn create(&self, record: QueueRecord) -> QueueResult<()> {
        validate_name(&record.name)?;
        match self.exists(&record.name).await {
            Ok(()) => return Err(QueueError::QueueExists(record.name)),
            Err(QueueError::QueueNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let key = keys::store_key(&self.prefix, &record.name);
        let value = serde_json::to_string(&record)?;
        self.pages.store().set(&key, &value, None).await?;
        info!(target_url = %record.target, signed = record.secret.is_some(), "queue created");
        Ok(())
    }

    /// Delete a queue and every status entry under its hash-tag.
    ///
    /// Status entries go first and the record last, so an interrupted destroy
    /// can simply be run again.
    #[instrument(skip(self))]
    pub async fn destroy(&self, name: &str) -> QueueResult<()> {
        self.exists(name).await?;

        let job_keys = self
            .pages
            .scan_keys(&keys::job_matcher(&self.prefix, name, None))
            .await?;
        let removed = self.pages.batch_delete(&job_keys).await?;
        debug!(removed, "status entries deleted");

        self.pages.store().del(&[keys::store_key(&self.prefix, name)]).await?;
        info!("queue destroyed");
        Ok(())
    }

    /// Names of every queue under this prefix, sorted
    pub async fn list_all(&self) -> QueueResult<Vec<String>> {
        let queue_keys = self.pages.scan_keys(&keys::queue_matcher(&self.prefix)).await?;
        let records: Vec<QueueRecord> = self.pages.batch_get(&queue_keys).await?;

        let mut names: Vec<String> = records.into_iter().map(|r| r.name).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

fn validate_name(name: &str) -> QueueResult<()> {
    if name.is_empty() || name.contains(['{', '}']) {
        return Err(QueueError::InvalidQueueName(name.to_string()));
    }
    Ok(())
}
