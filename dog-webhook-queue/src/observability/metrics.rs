use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Live counters for adapter operations.
///
/// Process-local; a fresh adapter starts from zero.
#[derive(Debug, Default)]
pub struct LiveMetrics {
    jobs_enqueued: AtomicU64,
    jobs_delivered: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_retried: AtomicU64,
    jobs_canceled: AtomicU64,
    queues_created: AtomicU64,
    queues_destroyed: AtomicU64,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_jobs_enqueued(&self) {
        self.jobs_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_delivered(&self) {
        self.jobs_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_retried(&self) {
        self.jobs_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_canceled(&self) {
        self.jobs_canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queues_created(&self) {
        self.queues_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queues_destroyed(&self) {
        self.queues_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn jobs_enqueued(&self) -> u64 {
        self.jobs_enqueued.load(Ordering::Relaxed)
    }

    pub fn jobs_delivered(&self) -> u64 {
        self.jobs_delivered.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    pub fn jobs_retried(&self) -> u64 {
        self.jobs_retried.load(Ordering::Relaxed)
    }

    pub fn jobs_canceled(&self) -> u64 {
        self.jobs_canceled.load(Ordering::Relaxed)
    }

    pub fn queues_created(&self) -> u64 {
        self.queues_created.load(Ordering::Relaxed)
    }

    pub fn queues_destroyed(&self) -> u64 {
        self.queues_destroyed.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_enqueued: self.jobs_enqueued(),
            jobs_delivered: self.jobs_delivered(),
            jobs_failed: self.jobs_failed(),
            jobs_retried: self.jobs_retried(),
            jobs_canceled: self.jobs_canceled(),
            queues_created: self.queues_created(),
            queues_destroyed: self.queues_destroyed(),
            taken_at: Utc::now(),
        }
    }
}

/// Serializable view of [`LiveMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_enqueued: u64,
    pub jobs_delivered: u64,
    pub jobs_failed: u64,
    pub jobs_retried: u64,
    pub jobs_canceled: u64,
    pub queues_created: u64,
    pub queues_destroyed: u64,
    pub taken_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Delivered share of finished deliveries, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.jobs_delivered + self.jobs_failed;
        if finished == 0 {
            100.0
        } else {
            (self.jobs_delivered as f64 / finished as f64) * 100.0
        }
    }
}
