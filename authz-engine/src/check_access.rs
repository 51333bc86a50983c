//! The `check_access` orchestrator (§4.7).

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value as Json};
use tokio::sync::Semaphore;

use authz_audit::AuditEntry;
use authz_cache::RealmMap;
use authz_core::AppError;
use authz_security::Principal;
use authz_store::repository::authorization;
use authz_store::repository::resource;

use crate::access_item::{AccessAnswer, AccessItem, AccessResult, CheckAccessRequest, ReturnType};
use crate::deps::EngineDeps;
use crate::external_ids::{self, ResolvedExternalIds};
use crate::realm;
use crate::roles;

/// Per-request fan-out cap (§4.7 "suggested ≤ 10").
const MAX_PARALLEL_ITEMS: usize = 10;

pub async fn check_access(
    deps: &EngineDeps,
    principal: &Principal,
    request: CheckAccessRequest,
) -> Result<Vec<AccessResult>, AppError> {
    let map = realm::resolve_realm(&deps.pool, &deps.cache, &request.realm_name).await?;

    let context = json!({
        "principal": principal.context_value(),
        "context": request.auth_context,
    });

    let mut role_ids = roles::effective_role_ids(
        request.role_names.as_deref(),
        &map.roles,
        &principal.role_ids,
    )?;
    role_ids.sort_unstable();

    // Validate every item's type/action names up front.
    for item in &request.items {
        realm::type_id(&map, &item.type_name)?;
        realm::action_id(&map, &item.action_name)?;
    }

    let id_requests: Vec<(String, Vec<String>)> = request
        .items
        .iter()
        .filter_map(|item| item.external_resource_ids.clone().map(|ids| (item.type_name.clone(), ids)))
        .collect();
    let resolved = external_ids::resolve_all(&deps.pool, &deps.cache, &request.realm_name, &map, &id_requests).await?;

    let semaphore = Arc::new(Semaphore::new(MAX_PARALLEL_ITEMS));
    let mut tasks = Vec::with_capacity(request.items.len());

    for item in request.items {
        let deps = deps.clone();
        let map = map.clone();
        let realm_name = request.realm_name.clone();
        let context = context.clone();
        let role_ids = role_ids.clone();
        let resolved = resolved.clone();
        let principal_id = principal.id;
        let semaphore = semaphore.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            let type_name = item.type_name.clone();
            let action_name = item.action_name.clone();
            let outcome = evaluate_item(&deps, &map, &realm_name, principal_id, &role_ids, &context, &item, &resolved).await;
            (type_name, action_name, outcome)
        }));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        let (type_name, action_name, outcome) = task.await.map_err(|e| AppError::Internal(e.to_string()))?;
        let answer = outcome?;
        results.push(AccessResult { type_name, action_name, answer });
    }

    Ok(results)
}

struct ItemOutcome {
    answer: AccessAnswer,
    granted_external_ids: Option<Vec<String>>,
    granted_resource_ids: Option<Vec<i64>>,
}

#[allow(clippy::too_many_arguments)]
async fn evaluate_item(
    deps: &EngineDeps,
    map: &RealmMap,
    realm_name: &str,
    principal_id: i64,
    role_ids: &[i64],
    context: &Json,
    item: &AccessItem,
    resolved: &ResolvedExternalIds,
) -> Result<AccessAnswer, AppError> {
    let type_id = realm::type_id(map, &item.type_name)?;
    let action_id = realm::action_id(map, &item.action_name)?;
    let public = realm::is_public(map, &item.type_name);

    let outcome = evaluate_item_inner(
        deps, map.id, realm_name, principal_id, role_ids, context, item, type_id, action_id, public, resolved,
    )
    .await?;

    audit(deps, map.id, principal_id, item, &outcome);
    Ok(outcome.answer)
}

#[allow(clippy::too_many_arguments)]
async fn evaluate_item_inner(
    deps: &EngineDeps,
    realm_id: i64,
    realm_name: &str,
    principal_id: i64,
    role_ids: &[i64],
    context: &Json,
    item: &AccessItem,
    type_id: i64,
    action_id: i64,
    public: bool,
    resolved: &ResolvedExternalIds,
) -> Result<ItemOutcome, AppError> {
    // 5a: cached type-level decision, only for a plain decision with no
    // specific external ids.
    if item.return_type == ReturnType::Decision && item.external_resource_ids.is_none() {
        if let Some(decision) = deps
            .cache
            .get_type_decision(realm_name, principal_id, &item.type_name, &item.action_name, role_ids)
            .await
        {
            return Ok(ItemOutcome { answer: AccessAnswer::Decision(decision), granted_external_ids: None, granted_resource_ids: None });
        }
    }

    // 5b: public type short-circuit.
    if public {
        return Ok(public_outcome(item, resolved));
    }

    let Some(requested_ids) = &item.external_resource_ids else {
        // 5d/5e: no external ids requested at all — whole-type query.
        return whole_type_outcome(deps, realm_id, realm_name, principal_id, role_ids, context, item, type_id, action_id).await;
    };

    let by_ext = resolved.get(&item.type_name);
    let mut resolved_internal_ids = Vec::new();
    let mut unresolved_externals = Vec::new();
    for ext in requested_ids {
        match by_ext.and_then(|m| m.get(ext)).copied().flatten() {
            Some(internal_id) => resolved_internal_ids.push((ext.clone(), internal_id)),
            None => unresolved_externals.push(ext.clone()),
        }
    }

    let mut granted_external: Vec<String> = Vec::new();

    if !resolved_internal_ids.is_empty() {
        let candidate_ids: Vec<i64> = resolved_internal_ids.iter().map(|(_, id)| *id).collect();
        let granted_ids = authorization::authorized_resources(
            &deps.pool, realm_id, principal_id, role_ids, type_id, action_id, context, Some(&candidate_ids),
        )
        .await?;
        let granted_set: HashSet<i64> = granted_ids.into_iter().collect();
        for (ext, internal_id) in &resolved_internal_ids {
            if granted_set.contains(internal_id) {
                granted_external.push(ext.clone());
            }
        }
    }

    // 5c: external ids that did not resolve fall back to the type-level
    // probe; a grant there covers every one of them.
    if !unresolved_externals.is_empty() {
        let granted = authorization::type_level_decision(&deps.pool, realm_id, principal_id, role_ids, type_id, action_id, context).await?;
        if granted {
            granted_external.extend(unresolved_externals.iter().cloned());
        }
    }

    let answer = match item.return_type {
        ReturnType::Decision => AccessAnswer::Decision(!granted_external.is_empty()),
        ReturnType::IdList => {
            // Preserve the caller's requested order.
            let ordered = requested_ids.iter().filter(|id| granted_external.contains(id)).cloned().collect();
            AccessAnswer::IdList(ordered)
        }
    };

    Ok(ItemOutcome { answer, granted_external_ids: Some(granted_external), granted_resource_ids: None })
}

fn public_outcome(item: &AccessItem, resolved: &ResolvedExternalIds) -> ItemOutcome {
    let requested = item.external_resource_ids.as_deref().unwrap_or(&[]);
    let by_ext = resolved.get(&item.type_name);
    let existing: Vec<String> = requested
        .iter()
        .filter(|ext| by_ext.and_then(|m| m.get(*ext)).copied().flatten().is_some())
        .cloned()
        .collect();

    let answer = match item.return_type {
        // §4.4: a public type's type-level decision is always true.
        ReturnType::Decision => AccessAnswer::Decision(true),
        ReturnType::IdList => AccessAnswer::IdList(existing.clone()),
    };
    ItemOutcome { answer, granted_external_ids: Some(existing), granted_resource_ids: None }
}

#[allow(clippy::too_many_arguments)]
async fn whole_type_outcome(
    deps: &EngineDeps,
    realm_id: i64,
    realm_name: &str,
    principal_id: i64,
    role_ids: &[i64],
    context: &Json,
    item: &AccessItem,
    type_id: i64,
    action_id: i64,
) -> Result<ItemOutcome, AppError> {
    let granted_ids =
        authorization::authorized_resources(&deps.pool, realm_id, principal_id, role_ids, type_id, action_id, context, None).await?;

    if granted_ids.is_empty() && item.return_type == ReturnType::Decision {
        // 5e: type-level fallback for "Create"-style decisions with no
        // resource rows to evaluate against.
        let granted = authorization::type_level_decision(&deps.pool, realm_id, principal_id, role_ids, type_id, action_id, context).await?;
        deps.cache.set_type_decision(realm_name, principal_id, &item.type_name, &item.action_name, role_ids, granted).await;
        return Ok(ItemOutcome { answer: AccessAnswer::Decision(granted), granted_external_ids: None, granted_resource_ids: None });
    }

    match item.return_type {
        ReturnType::Decision => {
            let decision = !granted_ids.is_empty();
            deps.cache.set_type_decision(realm_name, principal_id, &item.type_name, &item.action_name, role_ids, decision).await;
            Ok(ItemOutcome { answer: AccessAnswer::Decision(decision), granted_external_ids: None, granted_resource_ids: Some(granted_ids.clone()) })
        }
        ReturnType::IdList => {
            let external_ids = resource::external_ids_for_resources(&deps.pool, realm_id, type_id, &granted_ids).await?;
            Ok(ItemOutcome { answer: AccessAnswer::IdList(external_ids.clone()), granted_external_ids: Some(external_ids), granted_resource_ids: Some(granted_ids.clone()) })
        }
    }
}

fn audit(deps: &EngineDeps, realm_id: i64, principal_id: i64, item: &AccessItem, outcome: &ItemOutcome) {
    let decision = match &outcome.answer {
        AccessAnswer::Decision(b) => *b,
        AccessAnswer::IdList(ids) => !ids.is_empty(),
    };
    let external_resource_ids = outcome
        .granted_external_ids
        .as_ref()
        .map(|ids| Json::Array(ids.iter().map(|id| Json::String(id.clone())).collect()));
    let resource_ids = outcome
        .granted_resource_ids
        .as_ref()
        .map(|ids| Json::Array(ids.iter().map(|id| Json::Number((*id).into())).collect()));

    deps.audit.enqueue(AuditEntry {
        realm_id,
        principal_id,
        action_name: Some(item.action_name.clone()),
        resource_type_name: Some(item.type_name.clone()),
        decision,
        resource_ids,
        external_resource_ids,
    });
}
