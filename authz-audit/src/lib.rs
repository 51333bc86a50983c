//! Fire-and-forget authorization decision logging (§6).
//!
//! [`AuditQueue::enqueue`] is called from the hot path and returns
//! immediately; the actual write either lands in a Redis list for
//! [`drainer::run`] to persist in the background, or — when Redis is
//! unavailable — falls straight into `authorization_log`.

pub mod drainer;
pub mod entry;
pub mod queue;

pub use entry::AuditEntry;
pub use queue::AuditQueue;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;

    fn sample_entry() -> AuditEntry {
        AuditEntry {
            realm_id: 1,
            principal_id: 7,
            action_name: Some("read".to_string()),
            resource_type_name: Some("document".to_string()),
            decision: true,
            resource_ids: Some(json!([1, 2, 3])),
            external_resource_ids: None,
        }
    }

    #[test]
    fn entry_round_trips_through_json() {
        let entry = sample_entry();
        let raw = serde_json::to_string(&entry).unwrap();
        let back: AuditEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.realm_id, entry.realm_id);
        assert_eq!(back.decision, entry.decision);
        assert_eq!(back.resource_ids, entry.resource_ids);
    }

    #[tokio::test]
    async fn enqueue_without_redis_falls_back_to_direct_insert_attempt() {
        // No live Postgres in unit tests: this exercises that `enqueue` never
        // panics or blocks when Redis is absent and the DB write fails, since
        // the insert error is only logged (§6 "never blocks the caller").
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/does-not-matter")
            .unwrap();
        let queue = AuditQueue::new(None, "audit_queue", pool);
        queue.enqueue(sample_entry());
    }
}
