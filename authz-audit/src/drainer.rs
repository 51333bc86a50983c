use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use authz_store::repository::authorization::insert_audit_log;

use crate::entry::AuditEntry;

/// Maximum entries drained from the queue in a single tick, so one huge
/// backlog can't starve the interval loop.
const DRAIN_BATCH_SIZE: usize = 500;

/// Background worker that pops entries pushed by [`crate::AuditQueue`] and
/// persists them into `authorization_log` (§6). Runs until `shutdown` is
/// cancelled. Queue contents are at-least-once: a crash between pop and
/// insert can replay an entry, which is acceptable for an audit trail (see
/// DESIGN.md).
pub async fn run(
    pool: PgPool,
    redis: ConnectionManager,
    queue_name: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("audit drainer shutting down");
                return;
            }
            _ = ticker.tick() => {
                drain_once(&pool, &redis, &queue_name).await;
            }
        }
    }
}

async fn drain_once(pool: &PgPool, redis: &ConnectionManager, queue_name: &str) {
    let mut conn = redis.clone();
    for _ in 0..DRAIN_BATCH_SIZE {
        let raw: Option<String> = match conn.rpop(queue_name, None).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "redis audit pop failed, pausing until next tick");
                return;
            }
        };
        let Some(raw) = raw else {
            return;
        };

        let entry: AuditEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "dropping unparseable audit queue entry");
                continue;
            }
        };

        if let Err(err) = insert_audit_log(
            pool,
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
            tracing::error!(error = %err, "failed to persist drained audit entry");
        }
    }
}
