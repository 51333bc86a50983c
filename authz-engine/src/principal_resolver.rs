//! Bridges [`authz_security::PrincipalResolver`] (database-free by design)
//! to the cache and storage layers, so `authz-security` never depends on
//! `authz-store`.

use sqlx::PgPool;

use authz_cache::{Cache, PrincipalRecord};
use authz_security::{BoxFuture, PrincipalResolver, ResolvedPrincipal};
use authz_store::repository::principal;

pub struct CachingPrincipalResolver {
    pool: PgPool,
    cache: Cache,
}

impl CachingPrincipalResolver {
    pub fn new(pool: PgPool, cache: Cache) -> Self {
        CachingPrincipalResolver { pool, cache }
    }
}

fn record_to_resolved(record: PrincipalRecord) -> ResolvedPrincipal {
    ResolvedPrincipal {
        id: record.id,
        username: record.username,
        realm_id: record.realm_id,
        attributes: record.attributes,
        role_ids: record.role_ids,
    }
}

async fn load_roles(pool: &PgPool, cache: &Cache, principal_id: i64) -> Vec<i64> {
    if let Some(roles) = cache.get_principal_roles(principal_id).await {
        return roles;
    }
    let roles = principal::role_ids(pool, principal_id).await.unwrap_or_default();
    cache.set_principal_roles(principal_id, &roles).await;
    roles
}

impl PrincipalResolver for CachingPrincipalResolver {
    fn resolve_by_id(&self, principal_id: i64) -> BoxFuture<'_, Option<ResolvedPrincipal>> {
        Box::pin(async move {
            if let Some(record) = self.cache.get_principal_by_id(principal_id).await {
                return Some(record_to_resolved(record));
            }

            let row = principal::find_by_id(&self.pool, principal_id).await.ok()??;
            let role_ids = load_roles(&self.pool, &self.cache, row.id).await;
            // `set_principal_record` also writes the by-username alias key,
            // which needs the realm *name* — not available from an id-only
            // lookup, so this path leaves the full-record cache to whichever
            // caller resolves by username (the common case: token resolution
            // always has a realm name in hand). Roles are still cached above.
            Some(record_to_resolved(PrincipalRecord {
                id: row.id,
                username: row.username,
                realm_id: row.realm_id,
                attributes: row.attributes,
                role_ids,
            }))
        })
    }

    fn resolve_by_username<'a>(&'a self, realm_id: i64, username: &'a str) -> BoxFuture<'a, Option<ResolvedPrincipal>> {
        Box::pin(async move {
            let row = principal::find_by_username(&self.pool, realm_id, username).await.ok()??;
            let role_ids = load_roles(&self.pool, &self.cache, row.id).await;
            let record = PrincipalRecord {
                id: row.id,
                username: row.username,
                realm_id: row.realm_id,
                attributes: row.attributes,
                role_ids,
            };
            Some(record_to_resolved(record))
        })
    }
}
