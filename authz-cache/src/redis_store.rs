use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::store::{CacheFuture, CacheStore};

/// Redis-backed implementation of [`CacheStore`]. `ConnectionManager`
/// transparently reconnects, so a single instance is shared process-wide
/// (§5 "the Redis client is a singleton per process").
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

impl CacheStore for RedisStore {
    fn get(&self, key: &str) -> CacheFuture<'_, Option<String>> {
        let key = key.to_string();
        let mut conn = self.conn.clone();
        Box::pin(async move {
            match conn.get::<_, Option<String>>(&key).await {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(error = %err, key, "redis get failed, treating as miss");
                    None
                }
            }
        })
    }

    fn set(&self, key: String, value: String, ttl: Duration) -> CacheFuture<'_, ()> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let seconds = ttl.as_secs().max(1);
            if let Err(err) = conn
                .set_ex::<_, _, ()>(&key, &value, seconds)
                .await
            {
                tracing::warn!(error = %err, key, "redis set failed, dropping write");
            }
        })
    }

    fn remove(&self, key: &str) -> CacheFuture<'_, ()> {
        let key = key.to_string();
        let mut conn = self.conn.clone();
        Box::pin(async move {
            if let Err(err) = conn.del::<_, ()>(&key).await {
                tracing::warn!(error = %err, key, "redis del failed");
            }
        })
    }

    fn remove_by_prefix(&self, prefix: &str) -> CacheFuture<'_, ()> {
        let pattern = format!("{prefix}*");
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let keys: Vec<String> = match conn.keys(&pattern).await {
                Ok(keys) => keys,
                Err(err) => {
                    tracing::warn!(error = %err, pattern, "redis keys scan failed");
                    return;
                }
            };
            if keys.is_empty() {
                return;
            }
            if let Err(err) = conn.del::<_, ()>(&keys).await {
                tracing::warn!(error = %err, pattern, "redis bulk del failed");
            }
        })
    }

    fn get_many<'a>(&'a self, keys: Vec<String>) -> CacheFuture<'a, Vec<Option<String>>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            if keys.is_empty() {
                return Vec::new();
            }
            match conn.get::<_, Vec<Option<String>>>(&keys).await {
                Ok(values) => values,
                Err(err) => {
                    tracing::warn!(error = %err, "redis pipelined mget failed");
                    vec![None; keys.len()]
                }
            }
        })
    }

    fn set_many<'a>(&'a self, entries: Vec<(String, String, Duration)>) -> CacheFuture<'a, ()> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let mut pipe = redis::pipe();
            for (key, value, ttl) in &entries {
                pipe.set_ex(key, value, ttl.as_secs().max(1));
            }
            if let Err(err) = pipe.query_async::<()>(&mut conn).await {
                tracing::warn!(error = %err, "redis pipelined mset failed");
            }
        })
    }
}
