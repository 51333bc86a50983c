//! Cache key schemas and TTLs (§4.3). Centralized here so every caller
//! builds keys the same way — invalidation only works if the writer and the
//! reader agree on the exact string.

use std::time::Duration;

pub const REALM_TTL: Duration = Duration::from_secs(3600);
pub const PRINCIPAL_ROLES_TTL: Duration = Duration::from_secs(3600);
pub const PRINCIPAL_RECORD_TTL: Duration = Duration::from_secs(3600);
pub const EXTERNAL_ID_TTL: Duration = Duration::from_secs(3600);
pub const TYPE_DECISION_TTL: Duration = Duration::from_secs(300);

pub fn realm_key(realm_name: &str) -> String {
    format!("realm:{realm_name}")
}

pub fn principal_roles_key(principal_id: i64) -> String {
    format!("principal_roles:{principal_id}")
}

pub fn principal_by_id_key(principal_id: i64) -> String {
    format!("principal:{principal_id}")
}

pub fn principal_by_username_key(realm_name: &str, username: &str) -> String {
    format!("principal:{realm_name}:{username}")
}

pub fn external_id_key(realm_name: &str, type_name: &str, external_id: &str) -> String {
    format!("extid:{realm_name}:{type_name}:{external_id}")
}

/// `role_ids` must already be sorted by the caller — the key embeds them in
/// whatever order it's given, and a stable order is what makes the cache
/// actually hit across requests for the same principal.
pub fn type_decision_key(
    realm_name: &str,
    principal_id: i64,
    type_name: &str,
    action_name: &str,
    sorted_role_ids: &[i64],
) -> String {
    let roles = if sorted_role_ids.is_empty() {
        "none".to_string()
    } else {
        sorted_role_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };
    format!("type_decision:{realm_name}:{principal_id}:{type_name}:{action_name}:{roles}")
}

pub fn type_decision_prefix(realm_name: &str) -> String {
    format!("type_decision:{realm_name}:")
}
