use std::time::Duration;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::{
    QueueResult, QueueError,
    config::{AdapterConfig, RedisUrl},
    store::KvStore,
};

/// Redis-backed KV store over a multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect using the adapter's connection string.
    ///
    /// Cluster deployments need a cluster-aware `KvStore`; this one talks to a
    /// single node.
    pub async fn connect(config: &AdapterConfig) -> QueueResult<Self> {
        config.validate()?;
        if config.cluster {
            return Err(QueueError::Configuration(
                "cluster mode requires a cluster-aware KvStore".to_string(),
            ));
        }

        let url = RedisUrl::parse(&config.url)?;
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| QueueError::Configuration(e.to_string()))?;
        let conn = ConnectionManager::new(client).await?;

        info!(host = %url.host, port = url.port, "connected to redis");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> QueueResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> QueueResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn mget(&self, keys: &[String]) -> QueueResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn scan(&self, cursor: &str, pattern: &str, count: usize) -> QueueResult<(String, Vec<String>)> {
        let mut conn = self.conn.clone();
        let (next, keys): (String, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((next, keys))
    }
}
