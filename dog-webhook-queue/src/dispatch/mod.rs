pub mod client;
pub mod signature;

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tracing::{debug, error, instrument, warn};

use crate::{
    DeliveryError, EngineJob, QueueError, QueueRecord,
    index::JobStatusIndex,
    observability::LiveMetrics,
    registry::QueueRegistry,
};

pub use client::{HttpWebhookClient, WebhookClient, WebhookRequest, WebhookResponse};
pub use signature::{compute_signature, signature_header, verify_signature, SIGNATURE_HEADER};

/// Delivers one dequeued job to its queue's webhook and records the outcome.
///
/// Stateless across jobs: any number of workers may share one dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    registry: QueueRegistry,
    index: JobStatusIndex,
    client: Arc<dyn WebhookClient>,
    failed_ttl: Duration,
    metrics: Arc<LiveMetrics>,
}

impl Dispatcher {
    pub fn new(
        registry: QueueRegistry,
        index: JobStatusIndex,
        client: Arc<dyn WebhookClient>,
        failed_ttl: Duration,
        metrics: Arc<LiveMetrics>,
    ) -> Self {
        Self {
            registry,
            index,
            client,
            failed_ttl,
            metrics,
        }
    }

    /// Run the delivery pipeline for one job.
    ///
    /// `Err` is meant for the engine's own failure bookkeeping; transport
    /// failures and rejections have already been written to the ERROR index.
    #[instrument(skip(self, job), fields(queue = %job.name, job_id = %job.id))]
    pub async fn dispatch(&self, job: &EngineJob) -> Result<(), DeliveryError> {
        // leaving READY closes the cancel window
        self.index.clear_ready(&job.name, &job.id).await?;

        let queue = match self.registry.get(&job.name).await {
            Ok(queue) => queue,
            Err(QueueError::QueueNotFound(_)) => {
                error!("job outlived its queue metadata");
                self.metrics.increment_jobs_failed();
                return Err(DeliveryError::QueueMissing(job.name.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        let request = build_request(&queue, job)?;
        match self.client.post(request).await {
            Ok(response) if response.is_success() => {
                debug!(status = response.status, "delivered");
                self.metrics.increment_jobs_delivered();
                Ok(())
            }
            Ok(response) => {
                let err = DeliveryError::Rejected {
                    status: response.status,
                    body: response.body,
                };
                self.record_failure(job, err).await
            }
            Err(err) => self.record_failure(job, err).await,
        }
    }

    async fn record_failure(&self, job: &EngineJob, err: DeliveryError) -> Result<(), DeliveryError> {
        warn!(error = %err, "delivery failed");
        self.metrics.increment_jobs_failed();
        self.index
            .mark_error(&job.name, &job.id, &job.data, &err.error_text(), self.failed_ttl)
            .await?;
        Err(err)
    }
}

/// POST the job payload, signed when the queue has a secret
fn build_request(queue: &QueueRecord, job: &EngineJob) -> Result<WebhookRequest, DeliveryError> {
    let mut headers = Vec::new();
    if let Some(secret) = &queue.secret {
        let now_ms = Utc::now().timestamp_millis();
        headers.push((
            SIGNATURE_HEADER.to_string(),
            signature_header(secret, &job.data, now_ms)?,
        ));
    }

    Ok(WebhookRequest {
        target: queue.target.clone(),
        headers,
        body: job.data.to_string(),
    })
}
