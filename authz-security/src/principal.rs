use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Reserved principal id meaning "unauthenticated caller" (§3, §4.9).
pub const ANONYMOUS_PRINCIPAL_ID: i64 = 0;

/// An authenticated (or anonymous) subject, resolved by the [`crate::jwt::TokenResolver`]
/// and threaded through the orchestrator as the caller's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub realm_id: i64,
    pub attributes: Json,
    pub role_ids: Vec<i64>,
    pub is_anonymous: bool,
}

impl Principal {
    /// The sentinel subject used whenever no token is presented, or whenever
    /// token verification fails for any reason (§4.9: on any failure, return
    /// the anonymous principal rather than propagating an error).
    pub fn anonymous() -> Self {
        Principal {
            id: ANONYMOUS_PRINCIPAL_ID,
            username: String::new(),
            realm_id: 0,
            attributes: Json::Object(Default::default()),
            role_ids: Vec::new(),
            is_anonymous: true,
        }
    }

    /// The `{principal: {...}}` half of the context object bound to the
    /// decision routines (§4.1, §4.7 step 2): attributes plus id/username/realm_id.
    pub fn context_value(&self) -> Json {
        let mut map = match &self.attributes {
            Json::Object(m) => m.clone(),
            _ => Default::default(),
        };
        map.insert("id".to_string(), Json::from(self.id));
        map.insert("username".to_string(), Json::from(self.username.clone()));
        map.insert("realm_id".to_string(), Json::from(self.realm_id));
        Json::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn anonymous_has_sentinel_id_and_no_roles() {
        let p = Principal::anonymous();
        assert_eq!(p.id, ANONYMOUS_PRINCIPAL_ID);
        assert!(p.is_anonymous);
        assert!(p.role_ids.is_empty());
    }

    #[test]
    fn context_value_merges_attributes_with_identity_fields() {
        let p = Principal {
            id: 7,
            username: "alice".into(),
            realm_id: 2,
            attributes: json!({"clearance": "05"}),
            role_ids: vec![1],
            is_anonymous: false,
        };
        let ctx = p.context_value();
        assert_eq!(ctx["clearance"], "05");
        assert_eq!(ctx["id"], 7);
        assert_eq!(ctx["username"], "alice");
        assert_eq!(ctx["realm_id"], 2);
    }
}
