use std::env;
use std::time::Duration;
use reqwest::Url;

use crate::{
    QueueResult, QueueError,
    store::pagination::{DEFAULT_SCAN_PAGE_SIZE, DEFAULT_BATCH_PAGE_SIZE},
};

/// Seven days, the default dead-letter retention
pub const DEFAULT_FAILED_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the webhook queue adapter
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Connection string of the KV store
    pub url: String,
    /// Number of concurrent dispatch workers
    pub concurrency: usize,
    /// How long ERROR entries are retained
    pub failed_ttl: Duration,
    /// Prefix for every key the adapter writes
    pub key_prefix: String,
    /// Whether the store is a cluster
    pub cluster: bool,
    /// Upper bound on a single webhook delivery
    pub delivery_timeout: Duration,
    /// Idle wait between empty dequeues
    pub poll_interval: Duration,
    /// COUNT hint per SCAN step
    pub scan_page_size: usize,
    /// Keys per MGET / DEL round trip
    pub batch_page_size: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            concurrency: 10,
            failed_ttl: DEFAULT_FAILED_TTL,
            key_prefix: String::new(),
            cluster: false,
            delivery_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            batch_page_size: DEFAULT_BATCH_PAGE_SIZE,
        }
    }
}

impl AdapterConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_failed_ttl(mut self, failed_ttl: Duration) -> Self {
        self.failed_ttl = failed_ttl;
        self
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_cluster(mut self, cluster: bool) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_page_sizes(mut self, scan: usize, batch: usize) -> Self {
        self.scan_page_size = scan;
        self.batch_page_size = batch;
        self
    }

    /// Build from environment variables.
    ///
    /// `QUEUE_REDIS_URL` is required; the rest fall back to defaults.
    pub fn from_env() -> QueueResult<Self> {
        let url = env::var("QUEUE_REDIS_URL").unwrap_or_default();
        let defaults = Self::new(url);

        let config = Self {
            concurrency: env_parse("QUEUE_CONCURRENCY", defaults.concurrency)?,
            failed_ttl: Duration::from_secs(env_parse("QUEUE_FAILED_TTL_SECS", defaults.failed_ttl.as_secs())?),
            key_prefix: env::var("QUEUE_KEY_PREFIX").unwrap_or_else(|_| defaults.key_prefix.clone()),
            cluster: env_parse("QUEUE_CLUSTER", defaults.cluster)?,
            delivery_timeout: Duration::from_secs(env_parse(
                "QUEUE_DELIVERY_TIMEOUT_SECS",
                defaults.delivery_timeout.as_secs(),
            )?),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the adapter cannot start with
    pub fn validate(&self) -> QueueResult<()> {
        if self.url.trim().is_empty() {
            return Err(QueueError::Configuration("url is required".to_string()));
        }
        if self.concurrency == 0 {
            return Err(QueueError::Configuration("concurrency must be at least 1".to_string()));
        }
        if self.scan_page_size == 0 || self.batch_page_size == 0 {
            return Err(QueueError::Configuration("page sizes must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> QueueResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| QueueError::Configuration(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// Parts of a `redis://` connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisUrl {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub tls: bool,
}

impl RedisUrl {
    pub fn parse(raw: &str) -> QueueResult<Self> {
        let url = Url::parse(raw).map_err(|e| QueueError::Configuration(format!("invalid url {raw}: {e}")))?;

        let tls = match url.scheme() {
            "redis" => false,
            "rediss" => true,
            other => {
                return Err(QueueError::Configuration(format!("unsupported url scheme: {other}")));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| QueueError::Configuration(format!("url has no host: {raw}")))?
            .to_string();

        Ok(Self {
            host,
            port: url.port().unwrap_or(6379),
            password: url.password().map(str::to_string),
            tls,
        })
    }
}
