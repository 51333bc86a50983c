//! Batched external-id resolution across every item in a request (§4.7 step
//! 4): one cache-pipelined lookup per type, falling back to a single
//! database query per type for whatever missed, then backfilling the cache.

use std::collections::HashMap;

use sqlx::PgPool;

use authz_cache::{Cache, RealmMap};
use authz_core::AppError;
use authz_store::repository::resource;

use crate::realm;

/// `type_name -> (external_id -> internal_id or None if it doesn't exist)`.
pub type ResolvedExternalIds = HashMap<String, HashMap<String, Option<i64>>>;

/// Resolves every external id referenced by `requests`, grouped by type.
/// `requests` is `(type_name, external_ids)` pairs; types with no external
/// ids requested are skipped entirely.
pub async fn resolve_all(
    pool: &PgPool,
    cache: &Cache,
    realm_name: &str,
    map: &RealmMap,
    requests: &[(String, Vec<String>)],
) -> Result<ResolvedExternalIds, AppError> {
    let mut by_type: HashMap<String, Vec<String>> = HashMap::new();
    for (type_name, ids) in requests {
        if ids.is_empty() {
            continue;
        }
        let entry = by_type.entry(type_name.clone()).or_default();
        for id in ids {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
    }

    let mut out = ResolvedExternalIds::new();
    for (type_name, ids) in by_type {
        let type_id = realm::type_id(map, &type_name)?;
        let resolved = resolve_one_type(pool, cache, realm_name, map.id, &type_name, type_id, &ids).await?;
        out.insert(type_name, resolved);
    }
    Ok(out)
}

async fn resolve_one_type(
    pool: &PgPool,
    cache: &Cache,
    realm_name: &str,
    realm_id: i64,
    type_name: &str,
    type_id: i64,
    ids: &[String],
) -> Result<HashMap<String, Option<i64>>, AppError> {
    let cached = cache.get_external_ids_batch(realm_name, type_name, ids).await;

    let mut resolved = HashMap::with_capacity(ids.len());
    let mut misses = Vec::new();
    for (ext, hit) in cached {
        match hit {
            Some(value) => {
                resolved.insert(ext, value);
            }
            None => misses.push(ext),
        }
    }

    if !misses.is_empty() {
        let rows = resource::resolve_external_ids(pool, realm_id, type_id, &misses).await?;
        let to_cache: Vec<(String, Option<i64>)> = rows.clone();
        cache.set_external_ids_batch(realm_name, type_name, &to_cache).await;
        for (ext, value) in rows {
            resolved.insert(ext, value);
        }
    }

    Ok(resolved)
}
