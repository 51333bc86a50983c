use sqlx::PgPool;

use authz_audit::AuditQueue;
use authz_cache::Cache;

/// Process-wide handles the orchestrator needs on every request (§9 "pass
/// them as explicit dependencies to request handlers rather than reaching
/// for them ambiently"). Cheap to clone: `PgPool` and `Cache` are
/// `Arc`-backed, `AuditQueue` derives `Clone` over the same.
#[derive(Clone)]
pub struct EngineDeps {
    pub pool: PgPool,
    pub cache: Cache,
    pub audit: AuditQueue,
}

impl EngineDeps {
    pub fn new(pool: PgPool, cache: Cache, audit: AuditQueue) -> Self {
        EngineDeps { pool, cache, audit }
    }
}
