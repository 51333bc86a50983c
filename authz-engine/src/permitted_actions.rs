//! `get_permitted_actions` (§4.8): for each requested type, the unconditional
//! type-level probe always runs (it is what lets callers ask about external
//! ids that don't exist yet), and is merged with the resource-level decision
//! when the ids did resolve.

use std::collections::{HashMap, HashSet};

use authz_core::AppError;
use authz_security::Principal;
use authz_store::repository::authorization;

use crate::access_item::{PermittedActionsRequest, PermittedActionsResult};
use crate::deps::EngineDeps;
use crate::external_ids;
use crate::realm;
use crate::roles;

pub async fn get_permitted_actions(
    deps: &EngineDeps,
    principal: &Principal,
    request: PermittedActionsRequest,
) -> Result<Vec<PermittedActionsResult>, AppError> {
    let map = realm::resolve_realm(&deps.pool, &deps.cache, &request.realm_name).await?;

    let context = serde_json::json!({
        "principal": principal.context_value(),
        "context": request.auth_context,
    });

    let mut role_ids = roles::effective_role_ids(request.role_names.as_deref(), &map.roles, &principal.role_ids)?;
    role_ids.sort_unstable();

    let id_requests: Vec<(String, Vec<String>)> = request
        .items
        .iter()
        .filter_map(|item| item.external_resource_ids.clone().map(|ids| (item.type_name.clone(), ids)))
        .collect();
    let resolved = external_ids::resolve_all(&deps.pool, &deps.cache, &request.realm_name, &map, &id_requests).await?;

    let mut out = Vec::new();
    for item in &request.items {
        let type_id = realm::type_id(&map, &item.type_name)?;

        let type_level_ids = authorization::type_level_actions(&deps.pool, map.id, principal.id, &role_ids, type_id, &context).await?;
        let type_level_names: HashSet<String> = type_level_ids
            .iter()
            .filter_map(|id| realm::action_name(&map, *id))
            .map(str::to_string)
            .collect();

        let Some(requested_ids) = &item.external_resource_ids else {
            out.push(PermittedActionsResult {
                type_name: item.type_name.clone(),
                external_id: None,
                action_names: sorted(type_level_names),
            });
            continue;
        };

        let by_ext = resolved.get(&item.type_name);
        let mut internal_by_external: HashMap<String, i64> = HashMap::new();
        for ext in requested_ids {
            if let Some(internal_id) = by_ext.and_then(|m| m.get(ext)).copied().flatten() {
                internal_by_external.insert(ext.clone(), internal_id);
            }
        }

        let mut per_resource: HashMap<i64, HashSet<String>> = HashMap::new();
        if !internal_by_external.is_empty() {
            let candidate_ids: Vec<i64> = internal_by_external.values().copied().collect();
            let rows = authorization::permitted_actions(
                &deps.pool, map.id, principal.id, &role_ids, type_id, Some(&candidate_ids), &context,
            )
            .await?;
            for row in rows {
                if let Some(name) = realm::action_name(&map, row.action_id) {
                    per_resource.entry(row.resource_id).or_default().insert(name.to_string());
                }
            }
        }

        for ext in requested_ids {
            let names = match internal_by_external.get(ext) {
                Some(internal_id) => {
                    let mut names = per_resource.remove(internal_id).unwrap_or_default();
                    names.extend(type_level_names.iter().cloned());
                    names
                }
                None => type_level_names.clone(),
            };
            out.push(PermittedActionsResult {
                type_name: item.type_name.clone(),
                external_id: Some(ext.clone()),
                action_names: sorted(names),
            });
        }
    }

    Ok(out)
}

fn sorted(set: HashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = set.into_iter().collect();
    v.sort_unstable();
    v
}
