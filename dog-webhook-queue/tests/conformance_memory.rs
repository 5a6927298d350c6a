use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use dog_webhook_queue::{
    AdapterConfig, DeliveryError, EngineJob, Envelope, HttpWebhookClient, JobId, JobState, JobStatus, JobView,
    KvStore, MemoryEngine, MemoryStore, QueueEngine, QueueResult, WebhookClient, WebhookQueueAdapter,
    WebhookRequest, WebhookResponse,
    dispatch::{verify_signature, SIGNATURE_HEADER},
    engine::EngineResult,
};

/// Engine whose workers see nothing until the gate opens, so READY entries
/// can be observed before delivery
#[derive(Clone)]
struct GatedEngine {
    inner: MemoryEngine,
    open: Arc<AtomicBool>,
}

impl GatedEngine {
    fn new() -> Self {
        Self {
            inner: MemoryEngine::new(),
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    fn close_gate(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueEngine for GatedEngine {
    async fn enqueue(&self, name: &str, data: Value, job_id: JobId) -> EngineResult<EngineJob> {
        self.inner.enqueue(name, data, job_id).await
    }

    async fn dequeue(&self) -> EngineResult<Option<EngineJob>> {
        if self.open.load(Ordering::SeqCst) {
            self.inner.dequeue().await
        } else {
            Ok(None)
        }
    }

    async fn ack_complete(&self, job_id: &JobId) -> EngineResult<()> {
        self.inner.ack_complete(job_id).await
    }

    async fn ack_fail(&self, job_id: &JobId, reason: &str) -> EngineResult<()> {
        self.inner.ack_fail(job_id, reason).await
    }

    async fn list_jobs(&self, name: &str, states: &[JobState]) -> EngineResult<Vec<EngineJob>> {
        self.inner.list_jobs(name, states).await
    }

    async fn remove_job(&self, job_id: &JobId) -> EngineResult<()> {
        self.inner.remove_job(job_id).await
    }

    async fn close(&self) -> EngineResult<()> {
        self.inner.close().await
    }
}

/// Mock endpoint: answers with a settable status and records every request
struct RecordingClient {
    status: AtomicU16,
    body: String,
    requests: Mutex<Vec<WebhookRequest>>,
}

impl RecordingClient {
    fn answering(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU16::new(status),
            body: body.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl WebhookClient for RecordingClient {
    async fn post(&self, request: WebhookRequest) -> Result<WebhookResponse, DeliveryError> {
        self.requests.lock().push(request);
        Ok(WebhookResponse {
            status: self.status.load(Ordering::SeqCst),
            body: self.body.clone(),
        })
    }
}

/// Memory store that remembers whether it was closed
#[derive(Clone, Default)]
struct ClosingStore {
    inner: MemoryStore,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl KvStore for ClosingStore {
    async fn get(&self, key: &str) -> QueueResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> QueueResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn del(&self, keys: &[String]) -> QueueResult<u64> {
        self.inner.del(keys).await
    }

    async fn mget(&self, keys: &[String]) -> QueueResult<Vec<Option<String>>> {
        self.inner.mget(keys).await
    }

    async fn scan(&self, cursor: &str, pattern: &str, count: usize) -> QueueResult<(String, Vec<String>)> {
        self.inner.scan(cursor, pattern, count).await
    }

    async fn close(&self) -> QueueResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    adapter: WebhookQueueAdapter,
    engine: GatedEngine,
    client: Arc<RecordingClient>,
}

fn create_test_config() -> AdapterConfig {
    AdapterConfig::new("memory://test")
        .with_key_prefix("test")
        .with_concurrency(2)
        .with_poll_interval(Duration::from_millis(5))
}

fn start(client: Arc<RecordingClient>) -> Harness {
    let engine = GatedEngine::new();
    let adapter = WebhookQueueAdapter::start(
        Arc::new(MemoryStore::new()),
        Arc::new(engine.clone()),
        client.clone(),
        create_test_config(),
    )
    .unwrap();
    Harness { adapter, engine, client }
}

async fn wait_for_state(engine: &GatedEngine, id: &JobId, state: JobState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.inner.job(id).map(|j| j.state) != Some(state) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Timeout waiting for job state");
}

async fn wait_for_dead_letter(adapter: &WebhookQueueAdapter, name: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while jobs(adapter.get(name, JobStatus::Error).await).is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Timeout waiting for ERROR entry");
}

fn posted_id(envelope: Envelope) -> JobId {
    match envelope {
        Envelope::Id { ok: true, id } => id,
        other => panic!("expected an id envelope, got {other:?}"),
    }
}

fn jobs(envelope: Envelope) -> Vec<JobView> {
    match envelope {
        Envelope::Jobs { ok: true, jobs } => jobs,
        other => panic!("expected a jobs envelope, got {other:?}"),
    }
}

/// 1. Creating the same queue twice conflicts
#[tokio::test]
async fn test_duplicate_create_conflicts() {
    let h = start(RecordingClient::answering(200, ""));

    assert_eq!(h.adapter.create("foobar", "http://x/hooks", None).await, Envelope::ok());
    let second = h.adapter.create("foobar", "http://x/hooks", None).await;

    assert_eq!(
        serde_json::to_value(&second).unwrap(),
        json!({ "ok": false, "status": 409, "msg": "Queue Already Exists" })
    );
    h.adapter.shutdown().await.unwrap();
}

/// 2. Destroy is NotFound for unknown queues and removes known ones from the index
#[tokio::test]
async fn test_destroy_removes_queue_from_index() {
    let h = start(RecordingClient::answering(200, ""));

    assert_eq!(h.adapter.destroy("nope").await.status(), Some(404));

    h.adapter.create("foobar", "http://x/hooks", None).await;
    h.adapter.create("fizzbuzz", "http://x/hooks", None).await;
    assert_eq!(h.adapter.destroy("foobar").await, Envelope::ok());

    assert_eq!(h.adapter.index().await, Envelope::queues(vec!["fizzbuzz".into()]));
    assert_eq!(h.adapter.destroy("foobar").await.status(), Some(404));

    let metrics = h.adapter.metrics();
    assert_eq!(metrics.queues_created, 2);
    assert_eq!(metrics.queues_destroyed, 1);
    h.adapter.shutdown().await.unwrap();
}

/// 3. Posted jobs are listed as READY until delivered, then vanish
#[tokio::test]
async fn test_post_then_deliver() {
    let h = start(RecordingClient::answering(200, ""));

    // Arrange
    h.adapter.create("foobar", "http://x/hooks", None).await;
    assert_eq!(
        serde_json::to_value(h.adapter.index().await).unwrap(),
        json!({ "ok": true, "queues": ["foobar"] })
    );

    // Act: enqueue while workers are held back
    let payload = json!({ "type": "FOOBAR", "payload": { "id": 1 } });
    let id = posted_id(h.adapter.post("foobar", payload.clone()).await);

    // Assert: READY round-trip before delivery
    let ready = jobs(h.adapter.get("foobar", JobStatus::Ready).await);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, id);
    assert_eq!(ready[0].job, payload);
    assert_eq!(ready[0].status, JobStatus::Ready);

    // Act: let the workers deliver
    h.engine.open();
    wait_for_state(&h.engine, &id, JobState::Completed).await;

    // Assert: nothing left in either listing
    assert!(jobs(h.adapter.get("foobar", JobStatus::Ready).await).is_empty());
    assert!(jobs(h.adapter.get("foobar", JobStatus::Error).await).is_empty());

    let requests = h.client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, "http://x/hooks");
    assert_eq!(serde_json::from_str::<Value>(&requests[0].body).unwrap(), payload);
    assert_eq!(requests[0].header(SIGNATURE_HEADER), None);

    let metrics = h.adapter.metrics();
    assert_eq!(metrics.jobs_enqueued, 1);
    assert_eq!(metrics.jobs_delivered, 1);
    h.adapter.shutdown().await.unwrap();
}

/// 4. Cancel removes a waiting job; a second cancel is NotFound
#[tokio::test]
async fn test_cancel_is_idempotent() {
    let h = start(RecordingClient::answering(200, ""));
    h.adapter.create("q", "http://x/hooks", None).await;
    let id = posted_id(h.adapter.post("q", json!({ "n": 1 })).await);

    assert_eq!(h.adapter.cancel("q", &id).await, Envelope::id(id.clone()));
    assert_eq!(h.adapter.cancel("q", &id).await.status(), Some(404));

    assert!(jobs(h.adapter.get("q", JobStatus::Ready).await).is_empty());
    assert!(h.engine.inner.job(&id).is_none());

    // the canceled job is never delivered
    h.engine.open();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.client.requests().is_empty());
    assert_eq!(h.adapter.metrics().jobs_canceled, 1);
    h.adapter.shutdown().await.unwrap();
}

/// 5. Retry re-enqueues the payload under a new id
#[tokio::test]
async fn test_retry_changes_job_id() {
    let h = start(RecordingClient::answering(422, "Woops"));
    h.adapter.create("q", "http://x/hooks", None).await;
    let payload = json!({ "a": 1 });
    let id = posted_id(h.adapter.post("q", payload.clone()).await);

    // Arrange: let the delivery fail
    h.engine.open();
    wait_for_dead_letter(&h.adapter, "q").await;
    h.engine.close_gate();

    let failed = jobs(h.adapter.get("q", JobStatus::Error).await);
    assert_eq!(failed[0].id, id);
    assert_eq!(failed[0].error.as_deref(), Some("Woops"));

    // Act
    let new_id = posted_id(h.adapter.retry("q", &id).await);

    // Assert
    assert_ne!(new_id, id);
    let errors = jobs(h.adapter.get("q", JobStatus::Error).await);
    assert!(errors.iter().all(|job| job.id != id));

    let ready = jobs(h.adapter.get("q", JobStatus::Ready).await);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, new_id);
    assert_eq!(ready[0].job, payload);

    // the first id is spent
    assert_eq!(h.adapter.retry("q", &id).await.status(), Some(404));
    assert_eq!(h.adapter.metrics().jobs_retried, 1);
    h.adapter.shutdown().await.unwrap();
}

/// 6. Destroying a queue removes its dead-letter entries
#[tokio::test]
async fn test_destroy_clears_dead_letters() {
    let h = start(RecordingClient::answering(422, "Unprocessable"));
    h.adapter.create("foobar", "http://x/hooks", Some("foobar".into())).await;
    h.adapter.post("foobar", json!({ "a": 1 })).await;

    h.engine.open();
    wait_for_dead_letter(&h.adapter, "foobar").await;

    // signed with the queue secret over the delivered body
    let requests = h.client.requests();
    let header = requests[0].header(SIGNATURE_HEADER).unwrap();
    assert!(header.starts_with("t="));
    assert!(verify_signature("foobar", header, &json!({ "a": 1 })));

    assert_eq!(h.adapter.destroy("foobar").await, Envelope::ok());
    assert_eq!(h.adapter.create("foobar", "http://x/hooks", Some("foobar".into())).await, Envelope::ok());

    assert!(jobs(h.adapter.get("foobar", JobStatus::Error).await).is_empty());
    h.adapter.shutdown().await.unwrap();
}

/// 7. Operations on missing queues and jobs resolve to 404 envelopes
#[tokio::test]
async fn test_missing_things_are_not_found() {
    let h = start(RecordingClient::answering(200, ""));

    assert_eq!(h.adapter.post("ghost", json!({})).await.status(), Some(404));
    assert_eq!(h.adapter.get("ghost", JobStatus::Ready).await.status(), Some(404));
    assert_eq!(h.adapter.retry("ghost", &JobId::new()).await.status(), Some(404));
    assert_eq!(h.adapter.cancel("ghost", &JobId::new()).await.status(), Some(404));

    h.adapter.create("q", "http://x/hooks", None).await;
    let unknown = h.adapter.retry("q", &JobId::new()).await;
    assert_eq!(
        serde_json::to_value(&unknown).unwrap(),
        json!({ "ok": false, "status": 404, "msg": "job not found" })
    );
    assert_eq!(h.adapter.cancel("q", &JobId::new()).await.status(), Some(404));

    // a READY job cannot be retried, an ERROR job cannot be canceled
    let id = posted_id(h.adapter.post("q", json!({})).await);
    assert_eq!(h.adapter.retry("q", &id).await.status(), Some(404));
    h.adapter.shutdown().await.unwrap();
}

/// 8. Cancel racing a worker that already took the job still succeeds
#[tokio::test]
async fn test_cancel_after_dequeue_is_success() {
    let h = start(RecordingClient::answering(200, ""));
    h.adapter.create("q", "http://x/hooks", None).await;
    let id = posted_id(h.adapter.post("q", json!({})).await);

    // the engine no longer knows the job, but the READY entry is still there
    h.engine.inner.remove_job(&id).await.unwrap();

    assert_eq!(h.adapter.cancel("q", &id).await, Envelope::id(id.clone()));
    assert!(jobs(h.adapter.get("q", JobStatus::Ready).await).is_empty());
    h.adapter.shutdown().await.unwrap();
}

/// 9. Shutdown stops the workers and closes the engine
#[tokio::test]
async fn test_shutdown_closes_engine() {
    let h = start(RecordingClient::answering(200, ""));
    h.adapter.create("q", "http://x/hooks", None).await;
    assert!(h.adapter.is_running());

    h.adapter.shutdown().await.unwrap();
    assert!(!h.adapter.is_running());
    assert!(h.engine.inner.is_closed());

    // the engine refuses work; the READY entry is rolled back
    let refused = h.adapter.post("q", json!({})).await;
    assert_eq!(refused.status(), Some(500));
    assert!(jobs(h.adapter.get("q", JobStatus::Ready).await).is_empty());

    // a second shutdown is harmless
    h.adapter.shutdown().await.unwrap();
}

/// 10. An invalid configuration never produces an adapter
#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let result = WebhookQueueAdapter::start(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryEngine::new()),
        RecordingClient::answering(200, ""),
        AdapterConfig::default(),
    );
    assert!(result.is_err());
}

/// 11. A retry the engine refuses leaves the dead letter in place
#[tokio::test]
async fn test_refused_retry_keeps_error_entry() {
    let h = start(RecordingClient::answering(422, "Woops"));
    h.adapter.create("q", "http://x/hooks", None).await;
    let id = posted_id(h.adapter.post("q", json!({ "a": 1 })).await);

    h.engine.open();
    wait_for_dead_letter(&h.adapter, "q").await;
    h.engine.close_gate();

    // Act: the engine goes away before the retry
    h.engine.inner.close().await.unwrap();
    let refused = h.adapter.retry("q", &id).await;

    // Assert: the failure surfaces and nothing was lost
    assert_eq!(refused.status(), Some(500));
    let errors = jobs(h.adapter.get("q", JobStatus::Error).await);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].id, id);
    assert_eq!(errors[0].job, json!({ "a": 1 }));
    assert_eq!(errors[0].error.as_deref(), Some("Woops"));
    assert!(jobs(h.adapter.get("q", JobStatus::Ready).await).is_empty());
    assert_eq!(h.adapter.metrics().jobs_retried, 0);
    h.adapter.shutdown().await.unwrap();
}

/// 12. A webhook that never answers is dead-lettered with a timeout message
#[tokio::test]
async fn test_delivery_timeout_is_dead_lettered() {
    // accepts connections and never writes a response
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = create_test_config().with_delivery_timeout(Duration::from_millis(200));
    let client = HttpWebhookClient::new(config.delivery_timeout).unwrap();
    let engine = GatedEngine::new();
    engine.open();
    let adapter = WebhookQueueAdapter::start(
        Arc::new(MemoryStore::new()),
        Arc::new(engine.clone()),
        Arc::new(client),
        config,
    )
    .unwrap();

    adapter.create("slow", &format!("http://{addr}/hooks"), None).await;
    let id = posted_id(adapter.post("slow", json!({ "a": 1 })).await);
    wait_for_dead_letter(&adapter, "slow").await;

    let errors = jobs(adapter.get("slow", JobStatus::Error).await);
    assert_eq!(errors[0].id, id);
    assert_eq!(errors[0].job, json!({ "a": 1 }));
    let recorded: Value = serde_json::from_str(errors[0].error.as_deref().unwrap()).unwrap();
    let msg = recorded["msg"].as_str().unwrap();
    assert!(msg.contains("timed out"), "unexpected message: {msg}");
    assert!(jobs(adapter.get("slow", JobStatus::Ready).await).is_empty());

    adapter.shutdown().await.unwrap();
    server.abort();
}

/// 13. Names that would break key isolation are refused with 400
#[tokio::test]
async fn test_queue_names_with_braces_are_refused() {
    let h = start(RecordingClient::answering(200, ""));
    h.adapter.create("a", "http://x/hooks", None).await;

    let refused = h.adapter.create("a}_job_ERROR_", "http://x/hooks", None).await;
    assert_eq!(
        serde_json::to_value(&refused).unwrap(),
        json!({ "ok": false, "status": 400, "msg": "Invalid Queue Name" })
    );
    assert_eq!(h.adapter.create("", "http://x/hooks", None).await.status(), Some(400));

    assert_eq!(h.adapter.index().await, Envelope::queues(vec!["a".into()]));
    assert_eq!(h.adapter.metrics().queues_created, 1);
    h.adapter.shutdown().await.unwrap();
}

/// 14. Shutdown also closes the store
#[tokio::test]
async fn test_shutdown_closes_store() {
    let store = ClosingStore::default();
    let adapter = WebhookQueueAdapter::start(
        Arc::new(store.clone()),
        Arc::new(MemoryEngine::new()),
        RecordingClient::answering(200, ""),
        create_test_config(),
    )
    .unwrap();
    assert!(!store.closed.load(Ordering::SeqCst));

    adapter.shutdown().await.unwrap();
    assert!(store.closed.load(Ordering::SeqCst));
}
