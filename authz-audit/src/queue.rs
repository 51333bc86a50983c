use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sqlx::PgPool;

use authz_store::repository::authorization::insert_audit_log;

use crate::entry::AuditEntry;

/// Push side of the audit pipeline (§6). `enqueue` never blocks the caller on
/// I/O: it spawns the push and returns immediately, logging rather than
/// propagating on failure. When no Redis connection is configured (or the
/// push to it fails) it falls back to inserting directly into
/// `authorization_log`, so a decision is never silently dropped even if the
/// queue itself is down.
#[derive(Clone)]
pub struct AuditQueue {
    redis: Option<ConnectionManager>,
    queue_name: String,
    pool: PgPool,
}

impl AuditQueue {
    pub fn new(redis: Option<ConnectionManager>, queue_name: impl Into<String>, pool: PgPool) -> Self {
        AuditQueue { redis, queue_name: queue_name.into(), pool }
    }

    /// Fire-and-forget enqueue: spawns the write and returns immediately.
    pub fn enqueue(&self, entry: AuditEntry) {
        let queue = self.clone();
        tokio::spawn(async move {
            queue.write(entry).await;
        });
    }

    async fn write(&self, entry: AuditEntry) {
        if let Some(conn) = &self.redis {
            let mut conn = conn.clone();
            let payload = match serde_json::to_string(&entry) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize audit entry, dropping");
                    return;
                }
            };
            match conn.lpush::<_, _, ()>(&self.queue_name, payload).await {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(error = %err, "redis audit push failed, falling back to direct insert");
                }
            }
        }
        self.insert_directly(&entry).await;
    }

    async fn insert_directly(&self, entry: &AuditEntry) {
        if let Err(err) = insert_audit_log(
            &self.pool,
            entry.realm_id,
            entry.principal_id,
            entry.action_name.as_deref(),
            entry.resource_type_name.as_deref(),
            entry.decision,
            entry.resource_ids.as_ref(),
            entry.external_resource_ids.as_ref(),
        )
        .await
        {
            tracing::error!(error = %err, "direct audit insert failed, decision was not logged");
        }
    }
}
