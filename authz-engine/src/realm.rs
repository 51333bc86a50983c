//! Realm map resolution, cache-first (§4.7 step 1).

use sqlx::PgPool;

use authz_cache::{Cache, RealmMap};
use authz_core::AppError;
use authz_store::repository::realm;

/// Resolve a realm's name to its cached (or freshly loaded) [`RealmMap`].
/// Populates the cache on miss. Errors with [`AppError::UnknownEntity`] if
/// no such realm exists.
pub async fn resolve_realm(pool: &PgPool, cache: &Cache, realm_name: &str) -> Result<RealmMap, AppError> {
    if let Some(map) = cache.get_realm_map(realm_name).await {
        return Ok(map);
    }

    let map = realm::load_realm_map(pool, realm_name)
        .await?
        .ok_or_else(|| AppError::UnknownEntity(format!("realm '{realm_name}'")))?;

    cache.set_realm_map(realm_name, &map).await;
    Ok(map)
}

pub fn type_id(map: &RealmMap, type_name: &str) -> Result<i64, AppError> {
    map.types
        .get(type_name)
        .copied()
        .ok_or_else(|| AppError::UnknownEntity(format!("resource type '{type_name}'")))
}

pub fn action_id(map: &RealmMap, action_name: &str) -> Result<i64, AppError> {
    map.actions
        .get(action_name)
        .copied()
        .ok_or_else(|| AppError::UnknownEntity(format!("action '{action_name}'")))
}

pub fn is_public(map: &RealmMap, type_name: &str) -> bool {
    map.type_public.get(type_name).copied().unwrap_or(false)
}

/// Reverse lookup for assembling responses from the ids the stored routines
/// return. O(n) in the number of actions in the realm, which is small.
pub fn action_name(map: &RealmMap, action_id: i64) -> Option<&str> {
    map.actions
        .iter()
        .find(|(_, id)| **id == action_id)
        .map(|(name, _)| name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_map() -> RealmMap {
        RealmMap {
            id: 1,
            public_key: None,
            algorithm: None,
            actions: HashMap::from([("read".to_string(), 10)]),
            types: HashMap::from([("document".to_string(), 20)]),
            type_public: HashMap::from([("document".to_string(), false)]),
            roles: HashMap::new(),
        }
    }

    #[test]
    fn unknown_type_is_unknown_entity() {
        let map = sample_map();
        assert!(matches!(type_id(&map, "nope"), Err(AppError::UnknownEntity(_))));
    }

    #[test]
    fn known_type_resolves() {
        let map = sample_map();
        assert_eq!(type_id(&map, "document").unwrap(), 20);
    }

    #[test]
    fn is_public_defaults_false_for_unknown_type() {
        let map = sample_map();
        assert!(!is_public(&map, "nope"));
    }
}
