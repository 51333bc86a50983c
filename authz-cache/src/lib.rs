//! Typed cache accessors over the backend-agnostic [`CacheStore`] trait.
//!
//! `Cache` is the thing the orchestrator and the stores hold: it knows the
//! key schemas and TTLs of §4.3 and serializes/deserializes the realm map
//! and principal record snapshots, but has no idea whether the bytes behind
//! it live in Redis or in an in-process map.

pub mod keys;
pub mod redis_store;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use redis_store::RedisStore;
pub use store::{CacheStore, InMemoryStore, EMPTY_SENTINEL, NONE_SENTINEL};

/// Snapshot of a realm's name/id lookups, cached as a single JSON blob under
/// `realm:<name>` rather than as a Redis hash — simpler to version and to
/// rebuild atomically from one transaction (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmMap {
    pub id: i64,
    pub public_key: Option<String>,
    pub algorithm: Option<String>,
    pub actions: HashMap<String, i64>,
    pub types: HashMap<String, i64>,
    pub type_public: HashMap<String, bool>,
    pub roles: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub id: i64,
    pub username: String,
    pub realm_id: i64,
    pub attributes: serde_json::Value,
    pub role_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    // -- realm map ---------------------------------------------------

    pub async fn get_realm_map(&self, realm_name: &str) -> Option<RealmMap> {
        let raw = self.backend.get(&keys::realm_key(realm_name)).await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn set_realm_map(&self, realm_name: &str, map: &RealmMap) {
        if let Ok(raw) = serde_json::to_string(map) {
            self.backend
                .set(keys::realm_key(realm_name), raw, keys::REALM_TTL)
                .await;
        }
    }

    /// Invalidate everything derived from a realm's name: the realm map
    /// itself and every cached type-level decision in that realm.
    pub async fn invalidate_realm(&self, realm_name: &str) {
        self.backend.remove(&keys::realm_key(realm_name)).await;
        self.invalidate_type_decisions(realm_name).await;
    }

    // -- principal roles ----------------------------------------------

    /// `None` means "not cached"; `Some(vec![])` means "cached as having no
    /// roles" (the `__empty__` sentinel collapsed back to an empty vec).
    pub async fn get_principal_roles(&self, principal_id: i64) -> Option<Vec<i64>> {
        let raw = self
            .backend
            .get(&keys::principal_roles_key(principal_id))
            .await?;
        if raw == EMPTY_SENTINEL {
            return Some(Vec::new());
        }
        Some(
            raw.split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect(),
        )
    }

    pub async fn set_principal_roles(&self, principal_id: i64, role_ids: &[i64]) {
        let raw = if role_ids.is_empty() {
            EMPTY_SENTINEL.to_string()
        } else {
            role_ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
        };
        self.backend
            .set(
                keys::principal_roles_key(principal_id),
                raw,
                keys::PRINCIPAL_ROLES_TTL,
            )
            .await;
    }

    pub async fn invalidate_principal_roles(&self, principal_id: i64) {
        self.backend
            .remove(&keys::principal_roles_key(principal_id))
            .await;
    }

    // -- principal record -----------------------------------------------

    pub async fn get_principal_by_id(&self, principal_id: i64) -> Option<PrincipalRecord> {
        let raw = self.backend.get(&keys::principal_by_id_key(principal_id)).await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn get_principal_by_username(
        &self,
        realm_name: &str,
        username: &str,
    ) -> Option<PrincipalRecord> {
        let raw = self
            .backend
            .get(&keys::principal_by_username_key(realm_name, username))
            .await?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn set_principal_record(&self, realm_name: &str, record: &PrincipalRecord) {
        if let Ok(raw) = serde_json::to_string(record) {
            self.backend
                .set(
                    keys::principal_by_id_key(record.id),
                    raw.clone(),
                    keys::PRINCIPAL_RECORD_TTL,
                )
                .await;
            self.backend
                .set(
                    keys::principal_by_username_key(realm_name, &record.username),
                    raw,
                    keys::PRINCIPAL_RECORD_TTL,
                )
                .await;
        }
    }

    pub async fn invalidate_principal(&self, realm_name: &str, principal_id: i64, username: &str) {
        self.invalidate_principal_roles(principal_id).await;
        self.backend.remove(&keys::principal_by_id_key(principal_id)).await;
        self.backend
            .remove(&keys::principal_by_username_key(realm_name, username))
            .await;
    }

    // -- external ids -----------------------------------------------------

    /// `None` = not cached; `Some(None)` = cached negative (`__none__`);
    /// `Some(Some(id))` = cached hit.
    pub async fn get_external_id(
        &self,
        realm_name: &str,
        type_name: &str,
        external_id: &str,
    ) -> Option<Option<i64>> {
        let raw = self
            .backend
            .get(&keys::external_id_key(realm_name, type_name, external_id))
            .await?;
        if raw == NONE_SENTINEL {
            return Some(None);
        }
        Some(raw.parse().ok())
    }

    /// Pipelined batch lookup preserving input order.
    pub async fn get_external_ids_batch(
        &self,
        realm_name: &str,
        type_name: &str,
        external_ids: &[String],
    ) -> Vec<(String, Option<Option<i64>>)> {
        let keys: Vec<String> = external_ids
            .iter()
            .map(|ext| keys::external_id_key(realm_name, type_name, ext))
            .collect();
        let raw_values = self.backend.get_many(keys).await;
        external_ids
            .iter()
            .cloned()
            .zip(raw_values)
            .map(|(ext, raw)| {
                let resolved = raw.map(|v| {
                    if v == NONE_SENTINEL {
                        None
                    } else {
                        v.parse().ok()
                    }
                });
                (ext, resolved)
            })
            .collect()
    }

    /// Pipelined batch write. `resolved = None` caches the negative sentinel.
    pub async fn set_external_ids_batch(
        &self,
        realm_name: &str,
        type_name: &str,
        entries: &[(String, Option<i64>)],
    ) {
        let writes = entries
            .iter()
            .map(|(ext, resolved)| {
                let key = keys::external_id_key(realm_name, type_name, ext);
                let value = match resolved {
                    Some(id) => id.to_string(),
                    None => NONE_SENTINEL.to_string(),
                };
                (key, value, keys::EXTERNAL_ID_TTL)
            })
            .collect();
        self.backend.set_many(writes).await;
    }

    pub async fn invalidate_external_id(&self, realm_name: &str, type_name: &str, external_id: &str) {
        self.backend
            .remove(&keys::external_id_key(realm_name, type_name, external_id))
            .await;
    }

    pub async fn invalidate_external_ids_for_type(&self, realm_name: &str, type_name: &str) {
        self.backend
            .remove_by_prefix(&format!("extid:{realm_name}:{type_name}:"))
            .await;
    }

    // -- type-level decision -----------------------------------------------

    pub async fn get_type_decision(
        &self,
        realm_name: &str,
        principal_id: i64,
        type_name: &str,
        action_name: &str,
        sorted_role_ids: &[i64],
    ) -> Option<bool> {
        let raw = self
            .backend
            .get(&keys::type_decision_key(
                realm_name,
                principal_id,
                type_name,
                action_name,
                sorted_role_ids,
            ))
            .await?;
        Some(raw == "1")
    }

    pub async fn set_type_decision(
        &self,
        realm_name: &str,
        principal_id: i64,
        type_name: &str,
        action_name: &str,
        sorted_role_ids: &[i64],
        decision: bool,
    ) {
        let key = keys::type_decision_key(
            realm_name,
            principal_id,
            type_name,
            action_name,
            sorted_role_ids,
        );
        let value = if decision { "1" } else { "0" }.to_string();
        self.backend.set(key, value, keys::TYPE_DECISION_TTL).await;
    }

    pub async fn invalidate_type_decisions(&self, realm_name: &str) {
        self.backend
            .remove_by_prefix(&keys::type_decision_prefix(realm_name))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_realm_map() -> RealmMap {
        RealmMap {
            id: 1,
            public_key: None,
            algorithm: None,
            actions: HashMap::from([("read".to_string(), 10)]),
            types: HashMap::from([("document".to_string(), 20)]),
            type_public: HashMap::from([("document".to_string(), false)]),
            roles: HashMap::from([("viewer".to_string(), 30)]),
        }
    }

    #[tokio::test]
    async fn realm_map_round_trips() {
        let cache = Cache::in_memory();
        assert!(cache.get_realm_map("acme").await.is_none());
        cache.set_realm_map("acme", &sample_realm_map()).await;
        let fetched = cache.get_realm_map("acme").await.unwrap();
        assert_eq!(fetched.id, 1);
        assert_eq!(fetched.types["document"], 20);
    }

    #[tokio::test]
    async fn invalidate_realm_clears_map_and_type_decisions() {
        let cache = Cache::in_memory();
        cache.set_realm_map("acme", &sample_realm_map()).await;
        cache
            .set_type_decision("acme", 1, "document", "read", &[30], true)
            .await;

        cache.invalidate_realm("acme").await;

        assert!(cache.get_realm_map("acme").await.is_none());
        assert!(cache
            .get_type_decision("acme", 1, "document", "read", &[30])
            .await
            .is_none());
    }

    #[tokio::test]
    async fn empty_principal_roles_cache_as_sentinel_but_read_back_as_empty_vec() {
        let cache = Cache::in_memory();
        cache.set_principal_roles(7, &[]).await;
        assert_eq!(cache.get_principal_roles(7).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn external_id_batch_distinguishes_miss_negative_and_hit() {
        let cache = Cache::in_memory();
        cache
            .set_external_ids_batch(
                "acme",
                "document",
                &[("exists".to_string(), Some(5)), ("gone".to_string(), None)],
            )
            .await;
        let results = cache
            .get_external_ids_batch(
                "acme",
                "document",
                &["exists".to_string(), "gone".to_string(), "uncached".to_string()],
            )
            .await;
        assert_eq!(results[0].1, Some(Some(5)));
        assert_eq!(results[1].1, Some(None));
        assert_eq!(results[2].1, None);
    }

    #[tokio::test]
    async fn type_decision_key_is_sensitive_to_role_set() {
        let cache = Cache::in_memory();
        cache
            .set_type_decision("acme", 1, "document", "read", &[1, 2], true)
            .await;
        assert_eq!(
            cache
                .get_type_decision("acme", 1, "document", "read", &[1, 2])
                .await,
            Some(true)
        );
        assert_eq!(
            cache
                .get_type_decision("acme", 1, "document", "read", &[])
                .await,
            None
        );
    }
}
