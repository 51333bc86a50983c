use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Negative-cache sentinel for "confirmed no roles" (distinct from "not yet
/// cached", which is a plain miss).
pub const EMPTY_SENTINEL: &str = "__empty__";
/// Negative-cache sentinel for "confirmed no such external id".
pub const NONE_SENTINEL: &str = "__none__";

pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backend-agnostic cache used for the realm map, principal roles/records,
/// external-id batches, and type-level decisions (§4.3).
///
/// Both the in-memory and the Redis implementation degrade a backend outage
/// to a transparent miss rather than an error — callers always fall back to
/// reading the database on a miss, so there is nothing to propagate.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> CacheFuture<'_, Option<String>>;
    fn set(&self, key: String, value: String, ttl: Duration) -> CacheFuture<'_, ()>;
    fn remove(&self, key: &str) -> CacheFuture<'_, ()>;
    /// Bulk-invalidate every key starting with `prefix` (used for
    /// `type_decision:<realm>:*` and similar pattern invalidations).
    fn remove_by_prefix(&self, prefix: &str) -> CacheFuture<'_, ()>;

    /// Pipelined multi-get, used for the external-id batch lookups. The
    /// default implementation issues sequential `get`s; a real Redis backend
    /// overrides this with a single pipeline round-trip.
    fn get_many<'a>(&'a self, keys: Vec<String>) -> CacheFuture<'a, Vec<Option<String>>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(keys.len());
            for key in &keys {
                out.push(self.get(key).await);
            }
            out
        })
    }

    /// Pipelined multi-set, used when populating a batch of external ids on
    /// miss. The default implementation issues sequential `set`s.
    fn set_many<'a>(&'a self, entries: Vec<(String, String, Duration)>) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            for (key, value, ttl) in entries {
                self.set(key, value, ttl).await;
            }
        })
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL cache. Used when `REDIS_URL` is unset (single-process
/// deployments, and the default in tests).
#[derive(Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_sync(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.expires_at < Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }
}

impl CacheStore for InMemoryStore {
    fn get(&self, key: &str) -> CacheFuture<'_, Option<String>> {
        let key = key.to_string();
        Box::pin(async move { self.get_sync(&key) })
    }

    fn set(&self, key: String, value: String, ttl: Duration) -> CacheFuture<'_, ()> {
        Box::pin(async move {
            self.entries.insert(
                key,
                Entry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            );
        })
    }

    fn remove(&self, key: &str) -> CacheFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            self.entries.remove(&key);
        })
    }

    fn remove_by_prefix(&self, prefix: &str) -> CacheFuture<'_, ()> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            self.entries.retain(|k, _| !k.starts_with(&prefix));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryStore::new();
        store
            .set("realm:acme".into(), "42".into(), Duration::from_secs(60))
            .await;
        assert_eq!(store.get("realm:acme").await, Some("42".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let store = InMemoryStore::new();
        store
            .set("k".into(), "v".into(), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn remove_by_prefix_clears_matching_keys_only() {
        let store = InMemoryStore::new();
        store
            .set("type_decision:acme:1".into(), "1".into(), Duration::from_secs(60))
            .await;
        store
            .set("type_decision:acme:2".into(), "0".into(), Duration::from_secs(60))
            .await;
        store
            .set("realm:acme".into(), "stay".into(), Duration::from_secs(60))
            .await;

        store.remove_by_prefix("type_decision:acme:").await;

        assert_eq!(store.get("type_decision:acme:1").await, None);
        assert_eq!(store.get("type_decision:acme:2").await, None);
        assert_eq!(store.get("realm:acme").await, Some("stay".to_string()));
    }

    #[tokio::test]
    async fn get_many_preserves_order_and_misses() {
        let store = InMemoryStore::new();
        store.set("a".into(), "1".into(), Duration::from_secs(60)).await;
        let result = store
            .get_many(vec!["a".to_string(), "missing".to_string()])
            .await;
        assert_eq!(result, vec![Some("1".to_string()), None]);
    }
}
