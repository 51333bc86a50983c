use serde::Deserialize;
use serde_json::Value as Json;

/// Parsed form of `realm.keycloak_config` (§3, §6.5).
#[derive(Debug, Clone, Deserialize)]
pub struct KeycloakConfig {
    pub enabled: bool,
    pub server_url: String,
    pub realm_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub sync_cron: String,
}

impl KeycloakConfig {
    pub fn from_json(raw: &Json) -> Option<Self> {
        serde_json::from_value(raw.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_well_formed_config() {
        let raw = json!({
            "enabled": true,
            "server_url": "https://idp.example.com",
            "realm_name": "acme",
            "client_id": "authz-engine",
            "client_secret": "shh",
            "sync_cron": "0 */5 * * * *",
        });
        let cfg = KeycloakConfig::from_json(&raw).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.sync_cron, "0 */5 * * * *");
    }

    #[test]
    fn missing_field_fails_to_parse() {
        let raw = json!({"enabled": true});
        assert!(KeycloakConfig::from_json(&raw).is_none());
    }
}
