//! `get_authorization_conditions` (§4.6): a thin wrapper that resolves names
//! to ids and effective roles, then hands the raw routine result back so the
//! wire layer can shape it however the client protocol wants.

use authz_core::AppError;
use authz_security::Principal;
use authz_store::repository::authorization::{self, ConditionsForClient};

use crate::deps::EngineDeps;
use crate::realm;
use crate::roles;

pub type ConditionsForClientView = ConditionsForClient;

pub async fn get_authorization_conditions(
    deps: &EngineDeps,
    principal: &Principal,
    realm_name: &str,
    role_names: Option<&[String]>,
    type_name: &str,
    action_name: &str,
) -> Result<ConditionsForClientView, AppError> {
    let map = realm::resolve_realm(&deps.pool, &deps.cache, realm_name).await?;
    let type_id = realm::type_id(&map, type_name)?;
    let action_id = realm::action_id(&map, action_name)?;

    let mut role_ids = roles::effective_role_ids(role_names, &map.roles, &principal.role_ids)?;
    role_ids.sort_unstable();

    authorization::conditions_for_client(&deps.pool, map.id, principal.id, &role_ids, type_id, action_id)
        .await
        .map_err(AppError::from)
}
