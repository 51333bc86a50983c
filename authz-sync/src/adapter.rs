use std::future::Future;
use std::pin::Pin;

use serde_json::Value as Json;

use crate::config::KeycloakConfig;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type SyncError = Box<dyn std::error::Error + Send + Sync>;

/// One user as reported by the identity provider (§6.5).
#[derive(Debug, Clone)]
pub struct IdpUser {
    pub username: String,
    pub attributes: Json,
    /// Roles assigned directly to the user.
    pub roles: Vec<String>,
    /// Groups the user belongs to; each group contributes further roles via
    /// [`IdpAdapter::fetch_group_roles`].
    pub groups: Vec<String>,
}

/// The wire protocol to an external identity provider, kept out of the
/// orchestrator entirely (§6.5 "its interface to the core is only the CRUD
/// it performs, expressed here as a trait"). A concrete implementation
/// speaks to Keycloak's admin REST API; this crate ships only the trait and
/// the reconciliation logic that drives it.
pub trait IdpAdapter: Send + Sync {
    fn fetch_roles<'a>(&'a self, config: &'a KeycloakConfig) -> BoxFuture<'a, Result<Vec<String>, SyncError>>;
    fn fetch_users<'a>(&'a self, config: &'a KeycloakConfig) -> BoxFuture<'a, Result<Vec<IdpUser>, SyncError>>;
    fn fetch_group_roles<'a>(
        &'a self,
        config: &'a KeycloakConfig,
        group_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, SyncError>>;
}
