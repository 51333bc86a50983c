use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One authorization decision, queued for durable logging (§6 "audit
/// pipeline"). Mirrors the columns of `authorization_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub realm_id: i64,
    pub principal_id: i64,
    pub action_name: Option<String>,
    pub resource_type_name: Option<String>,
    pub decision: bool,
    pub resource_ids: Option<Json>,
    pub external_resource_ids: Option<Json>,
}
