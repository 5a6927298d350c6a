use std::sync::Arc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::{
    QueueResult, QueueError, EngineError, Envelope, JobId, JobStatus, JobView, QueueRecord,
    config::AdapterConfig,
    dispatch::{Dispatcher, WebhookClient},
    engine::QueueEngine,
    index::JobStatusIndex,
    observability::{LiveMetrics, MetricsSnapshot},
    registry::QueueRegistry,
    store::{KvStore, Pagination},
    worker::{spawn_workers, WorkerHandle},
};

/// Named webhook queues on top of a job engine and a KV store.
///
/// Every host-facing operation resolves to an [`Envelope`]; errors never
/// escape as `Err`. The `try_*` variants return the underlying result for
/// callers that prefer `?`.
pub struct WebhookQueueAdapter {
    config: AdapterConfig,
    registry: QueueRegistry,
    index: JobStatusIndex,
    engine: Arc<dyn QueueEngine>,
    store: Arc<dyn KvStore>,
    metrics: Arc<LiveMetrics>,
    workers: Mutex<Option<WorkerHandle>>,
}

impl WebhookQueueAdapter {
    /// Build the adapter and spawn `config.concurrency` dispatch workers.
    ///
    /// Must be called from within a tokio runtime. An invalid config is
    /// fatal: no adapter is constructed.
    pub fn start(
        store: Arc<dyn KvStore>,
        engine: Arc<dyn QueueEngine>,
        client: Arc<dyn WebhookClient>,
        config: AdapterConfig,
    ) -> QueueResult<Self> {
        config.validate()?;

        let pages = Pagination::with_page_sizes(store.clone(), config.scan_page_size, config.batch_page_size);
        let registry = QueueRegistry::new(config.key_prefix.clone(), pages.clone());
        let index = JobStatusIndex::new(config.key_prefix.clone(), pages, registry.clone());
        let metrics = Arc::new(LiveMetrics::new());

        let dispatcher = Dispatcher::new(
            registry.clone(),
            index.clone(),
            client,
            config.failed_ttl,
            metrics.clone(),
        );
        let workers = spawn_workers(engine.clone(), dispatcher, config.concurrency, config.poll_interval);

        info!(
            prefix = %config.key_prefix,
            concurrency = config.concurrency,
            failed_ttl_secs = config.failed_ttl.as_secs(),
            "Webhook queue adapter started"
        );

        Ok(Self {
            config,
            registry,
            index,
            engine,
            store,
            metrics,
            workers: Mutex::new(Some(workers)),
        })
    }

    /// Connect to Redis for queue metadata and status entries, with an
    /// in-process engine and the reqwest webhook client.
    #[cfg(feature = "redis")]
    pub async fn connect(config: AdapterConfig) -> QueueResult<Self> {
        use crate::{
            dispatch::HttpWebhookClient,
            engine::memory::{MemoryEngine, DEFAULT_KEEP_COMPLETED},
            store::redis::RedisStore,
        };

        let store = RedisStore::connect(&config).await?;
        let engine = MemoryEngine::with_retention(DEFAULT_KEEP_COMPLETED, config.failed_ttl);
        let client = HttpWebhookClient::new(config.delivery_timeout)?;
        Self::start(Arc::new(store), Arc::new(engine), Arc::new(client), config)
    }

    /// `{ok, queues}` with every queue name, sorted
    pub async fn index(&self) -> Envelope {
        respond("index", self.try_index().await.map(Envelope::queues))
    }

    /// `{ok}`; 409 if the name is taken
    pub async fn create(&self, name: &str, target: &str, secret: Option<String>) -> Envelope {
        respond("create", self.try_create(name, target, secret).await)
    }

    /// `{ok}`; 404 if the queue does not exist
    pub async fn destroy(&self, name: &str) -> Envelope {
        respond("destroy", self.try_destroy(name).await)
    }

    /// `{ok, id}` of the enqueued job; 404 if the queue does not exist
    pub async fn post(&self, name: &str, job: Value) -> Envelope {
        respond("post", self.try_post(name, job).await)
    }

    /// `{ok, jobs}` in `status`; 404 if the queue does not exist
    pub async fn get(&self, name: &str, status: JobStatus) -> Envelope {
        respond("get", self.try_get(name, status).await)
    }

    /// `{ok, id}` with the re-enqueued job's new id; 404 without an ERROR entry
    pub async fn retry(&self, name: &str, id: &JobId) -> Envelope {
        respond("retry", self.try_retry(name, id).await)
    }

    /// `{ok, id}`; 404 without a READY entry
    pub async fn cancel(&self, name: &str, id: &JobId) -> Envelope {
        respond("cancel", self.try_cancel(name, id).await)
    }

    pub async fn try_index(&self) -> QueueResult<Vec<String>> {
        self.registry.list_all().await
    }

    #[instrument(skip(self, secret), fields(queue = %name))]
    pub async fn try_create(&self, name: &str, target: &str, secret: Option<String>) -> QueueResult<()> {
        self.registry.create(QueueRecord::new(name, target, secret)).await?;
        self.metrics.increment_queues_created();
        Ok(())
    }

    #[instrument(skip(self), fields(queue = %name))]
    pub async fn try_destroy(&self, name: &str) -> QueueResult<()> {
        self.registry.destroy(name).await?;
        self.metrics.increment_queues_destroyed();
        Ok(())
    }

    #[instrument(skip(self, job), fields(queue = %name))]
    pub async fn try_post(&self, name: &str, job: Value) -> QueueResult<JobId> {
        self.registry.exists(name).await?;
        let id = self.enqueue(name, job).await?;
        info!(job_id = %id, "Job enqueued");
        Ok(id)
    }

    pub async fn try_get(&self, name: &str, status: JobStatus) -> QueueResult<Vec<JobView>> {
        self.index.list(name, status).await
    }

    #[instrument(skip(self), fields(queue = %name, job_id = %id))]
    pub async fn try_retry(&self, name: &str, id: &JobId) -> QueueResult<JobId> {
        self.registry.exists(name).await?;
        let entry = self
            .index
            .get(name, JobStatus::Error, id)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;

        // the dead letter stays listed until its replacement is in the engine
        let new_id = self.enqueue(name, entry.data).await?;
        self.index.clear_error(name, id).await?;

        self.metrics.increment_jobs_retried();
        info!(new_job_id = %new_id, "Job re-enqueued");
        Ok(new_id)
    }

    /// Pull a READY job out of the engine and drop its entry.
    ///
    /// A cancel that lands between `enqueue` writing the READY entry and the
    /// engine accepting the job finds nothing to remove, still reports
    /// success, and the job is delivered anyway. Like the check-then-write in
    /// queue creation, closing this gap needs an atomic engine-side step.
    #[instrument(skip(self), fields(queue = %name, job_id = %id))]
    pub async fn try_cancel(&self, name: &str, id: &JobId) -> QueueResult<JobId> {
        self.registry.exists(name).await?;
        if self.index.get(name, JobStatus::Ready, id).await?.is_none() {
            return Err(QueueError::JobNotFound(id.to_string()));
        }

        match self.engine.remove_job(id).await {
            Ok(()) => {}
            // already picked up by a worker; it will not run again from here
            Err(EngineError::JobNotFound(_)) => debug!("Job already left the engine's waiting set"),
            Err(e) => return Err(e.into()),
        }
        self.index.clear_ready(name, id).await?;

        self.metrics.increment_jobs_canceled();
        info!("Job canceled");
        Ok(id.clone())
    }

    /// Write the READY entry, then hand the job to the engine.
    ///
    /// The entry goes first so a worker that dequeues immediately always
    /// finds something to clear; it is rolled back if the engine refuses.
    /// Until the engine accepts the job, a concurrent cancel cannot remove it
    /// (see [`try_cancel`](Self::try_cancel)).
    async fn enqueue(&self, name: &str, data: Value) -> QueueResult<JobId> {
        let id = JobId::new();
        self.index.mark_ready(name, &id, &data).await?;

        if let Err(e) = self.engine.enqueue(name, data, id.clone()).await {
            if let Err(cleanup) = self.index.clear_ready(name, &id).await {
                error!(job_id = %id, "Failed to roll back READY entry: {}", cleanup);
            }
            return Err(e.into());
        }

        self.metrics.increment_jobs_enqueued();
        Ok(id)
    }

    /// Stop dequeuing, wait for in-flight deliveries, then close the engine
    /// and the store.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) -> QueueResult<()> {
        let workers = self.workers.lock().take();
        if let Some(workers) = workers {
            info!("Shutting down dispatch workers");
            workers.shutdown().await?;
        }

        self.engine.close().await?;
        self.store.close().await?;
        info!("Webhook queue adapter stopped");
        Ok(())
    }

    /// Whether dispatch workers are still running
    pub fn is_running(&self) -> bool {
        self.workers.lock().is_some()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }

    pub fn status_index(&self) -> &JobStatusIndex {
        &self.index
    }
}

/// Fold an operation result into its envelope, logging real faults
fn respond<T: Into<Envelope>>(operation: &str, result: QueueResult<T>) -> Envelope {
    if let Err(err) = &result {
        if err.is_expected() {
            debug!(operation, status = err.status_code(), "{}", err);
        } else {
            error!(operation, "Operation failed: {}", err);
        }
    }
    result.into()
}
