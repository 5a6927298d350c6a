use std::sync::Arc;
use std::time::Duration;
use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, instrument};

use crate::{
    QueueResult, QueueError, EngineError, EngineJob,
    dispatch::Dispatcher,
    engine::QueueEngine,
};

/// Back-off after an engine error before polling again
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Handle for managing the dispatch workers
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handles: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Number of running worker tasks
    pub fn len(&self) -> usize {
        self.join_handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.join_handles.is_empty()
    }

    /// Stop taking new jobs and wait for in-flight deliveries to finish
    pub async fn shutdown(self) -> QueueResult<()> {
        let _ = self.shutdown_tx.send(true);

        let mut first_err = None;
        for joined in join_all(self.join_handles).await {
            if let Err(e) = joined {
                error!("Worker join error: {}", e);
                first_err.get_or_insert(QueueError::Internal(format!("Worker join error: {}", e)));
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Spawns `concurrency` workers that pull from the engine and hand each job
/// to the dispatcher.
pub fn spawn_workers(
    engine: Arc<dyn QueueEngine>,
    dispatcher: Dispatcher,
    concurrency: usize,
    poll_interval: Duration,
) -> WorkerHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let join_handles = (0..concurrency)
        .map(|slot| {
            let worker = Worker {
                slot,
                engine: engine.clone(),
                dispatcher: dispatcher.clone(),
                poll_interval,
                shutdown_rx: shutdown_rx.clone(),
            };
            tokio::spawn(worker.run())
        })
        .collect();

    info!(concurrency, "Started dispatch workers");
    WorkerHandle {
        shutdown_tx,
        join_handles,
    }
}

struct Worker {
    slot: usize,
    engine: Arc<dyn QueueEngine>,
    dispatcher: Dispatcher,
    poll_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl Worker {
    #[instrument(skip(self), fields(slot = self.slot))]
    async fn run(mut self) {
        debug!("Worker started");

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            // only the wait for work is raced against shutdown; a delivery
            // that has started always runs to completion
            let next = tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => break,
                next = self.engine.dequeue() => next,
            };

            let idle = match next {
                Ok(Some(job)) => {
                    self.process(job).await;
                    None
                }
                Ok(None) => Some(self.poll_interval),
                Err(EngineError::Closed) => {
                    debug!("Engine closed");
                    break;
                }
                Err(e) => {
                    error!("Error dequeuing job: {}", e);
                    Some(ERROR_BACKOFF)
                }
            };

            if let Some(wait) = idle {
                tokio::select! {
                    biased;
                    _ = self.shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }

        debug!("Worker stopped");
    }

    async fn process(&self, job: EngineJob) {
        let acked = match self.dispatcher.dispatch(&job).await {
            Ok(()) => self.engine.ack_complete(&job.id).await,
            Err(err) => self.engine.ack_fail(&job.id, &err.to_string()).await,
        };

        if let Err(e) = acked {
            warn!(job_id = %job.id, "Failed to report job outcome to engine: {}", e);
        }
    }
}
