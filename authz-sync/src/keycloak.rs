//! Concrete [`IdpAdapter`] speaking to the Keycloak Admin REST API directly
//! over HTTP, rather than a dedicated SDK (§6.5, grounded on
//! `common/adapters/keycloak_adapter.py`'s `get_roles`/`get_principals`/
//! `get_user_roles`/`get_groups`/`get_user_groups` calls).
//!
//! Tokens are fetched via the client-credentials grant and cached until
//! shortly before expiry; every other call reuses that bearer token.

use std::sync::Arc;
use tokio::sync::RwLock;

use serde::Deserialize;
use serde_json::Value as Json;

use crate::adapter::{BoxFuture, IdpAdapter, IdpUser, SyncError};
use crate::config::KeycloakConfig;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: std::time::Instant,
}

pub struct KeycloakAdapter {
    http: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl Default for KeycloakAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl KeycloakAdapter {
    pub fn new() -> Self {
        KeycloakAdapter { http: reqwest::Client::new(), token: RwLock::new(None) }
    }

    async fn access_token(&self, config: &KeycloakConfig) -> Result<String, SyncError> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > std::time::Instant::now() {
                return Ok(cached.access_token.clone());
            }
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let url = format!("{}/realms/{}/protocol/openid-connect/token", config.server_url, config.realm_name);
        let resp = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await?;

        let expires_at = std::time::Instant::now() + std::time::Duration::from_secs(resp.expires_in.saturating_sub(10));
        let access_token = resp.access_token.clone();
        *self.token.write().await = Some(CachedToken { access_token: resp.access_token, expires_at });
        Ok(access_token)
    }

    async fn admin_get(&self, config: &KeycloakConfig, path: &str) -> Result<Json, SyncError> {
        let token = self.access_token(config).await?;
        let url = format!("{}/admin/realms/{}{path}", config.server_url, config.realm_name);
        let resp = self.http.get(url).bearer_auth(token).send().await?.error_for_status()?.json::<Json>().await?;
        Ok(resp)
    }
}

fn string_field(value: &Json, field: &str) -> Option<String> {
    value.get(field).and_then(Json::as_str).map(str::to_string)
}

impl IdpAdapter for KeycloakAdapter {
    fn fetch_roles<'a>(&'a self, config: &'a KeycloakConfig) -> BoxFuture<'a, Result<Vec<String>, SyncError>> {
        Box::pin(async move {
            let roles = self.admin_get(config, "/roles").await?;
            let names = roles
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|r| string_field(r, "name"))
                .collect();
            Ok(names)
        })
    }

    fn fetch_users<'a>(&'a self, config: &'a KeycloakConfig) -> BoxFuture<'a, Result<Vec<IdpUser>, SyncError>> {
        Box::pin(async move {
            let users = self.admin_get(config, "/users").await?;
            let mut out = Vec::new();
            for user in users.as_array().into_iter().flatten() {
                let Some(username) = string_field(user, "username") else { continue };
                let Some(user_id) = string_field(user, "id") else { continue };

                let role_names = self
                    .admin_get(config, &format!("/users/{user_id}/role-mappings/realm"))
                    .await
                    .unwrap_or(Json::Array(Vec::new()))
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|r| string_field(r, "name"))
                    .collect();

                let group_names = self
                    .admin_get(config, &format!("/users/{user_id}/groups"))
                    .await
                    .unwrap_or(Json::Array(Vec::new()))
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|g| string_field(g, "name"))
                    .collect();

                out.push(IdpUser {
                    username,
                    attributes: user.get("attributes").cloned().unwrap_or(Json::Object(Default::default())),
                    roles: role_names,
                    groups: group_names,
                });
            }
            Ok(out)
        })
    }

    fn fetch_group_roles<'a>(
        &'a self,
        config: &'a KeycloakConfig,
        group_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, SyncError>> {
        Box::pin(async move {
            let groups = self.admin_get(config, "/groups").await?;
            let Some(group_id) = groups
                .as_array()
                .into_iter()
                .flatten()
                .find(|g| string_field(g, "name").as_deref() == Some(group_name))
                .and_then(|g| string_field(g, "id"))
            else {
                return Ok(Vec::new());
            };

            let roles = self.admin_get(config, &format!("/groups/{group_id}/role-mappings/realm")).await?;
            Ok(roles.as_array().into_iter().flatten().filter_map(|r| string_field(r, "name")).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_field_reads_a_present_string() {
        let value = serde_json::json!({"name": "editor"});
        assert_eq!(string_field(&value, "name").as_deref(), Some("editor"));
    }

    #[test]
    fn string_field_is_none_for_missing_or_non_string() {
        let value = serde_json::json!({"name": 7});
        assert_eq!(string_field(&value, "name"), None);
        assert_eq!(string_field(&value, "missing"), None);
    }
}
