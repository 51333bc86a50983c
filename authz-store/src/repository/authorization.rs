use serde_json::Value as Json;
use sqlx::PgPool;

use crate::error::{DataError, SqlxErrorExt};

/// Calls the `authorized_resources` stored routine (§4.4).
pub async fn authorized_resources(
    pool: &PgPool,
    realm_id: i64,
    principal_id: i64,
    role_ids: &[i64],
    type_id: i64,
    action_id: i64,
    ctx: &Json,
    candidate_resource_ids: Option<&[i64]>,
) -> Result<Vec<i64>, DataError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT resource_id FROM authorized_resources($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(realm_id)
    .bind(principal_id)
    .bind(role_ids)
    .bind(type_id)
    .bind(action_id)
    .bind(ctx)
    .bind(candidate_resource_ids)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Calls the `type_level_decision` stored routine — evaluates only the
/// type-level ACL branches, with no resource row to join against. Used for
/// the §4.4 "type-level fallback" and when the caller's external ids failed
/// to resolve to anything (§4.7 step 5c).
#[allow(clippy::too_many_arguments)]
pub async fn type_level_decision(
    pool: &PgPool,
    realm_id: i64,
    principal_id: i64,
    role_ids: &[i64],
    type_id: i64,
    action_id: i64,
    ctx: &Json,
) -> Result<bool, DataError> {
    sqlx::query_scalar("SELECT type_level_decision($1, $2, $3, $4, $5, $6)")
        .bind(realm_id)
        .bind(principal_id)
        .bind(role_ids)
        .bind(type_id)
        .bind(action_id)
        .bind(ctx)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)
}

/// Calls the `type_level_actions` stored routine (§4.8's "unconditional
/// type-level probe"): the set of actions granted by some type-level branch,
/// independent of whether any resource of the type exists.
pub async fn type_level_actions(
    pool: &PgPool,
    realm_id: i64,
    principal_id: i64,
    role_ids: &[i64],
    type_id: i64,
    ctx: &Json,
) -> Result<Vec<i64>, DataError> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT action_id FROM type_level_actions($1, $2, $3, $4, $5)")
        .bind(realm_id)
        .bind(principal_id)
        .bind(role_ids)
        .bind(type_id)
        .bind(ctx)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_data_error)?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PermittedAction {
    pub resource_id: i64,
    pub action_id: i64,
    pub is_type_level: bool,
}

/// Calls the `permitted_actions` stored routine (§4.5).
pub async fn permitted_actions(
    pool: &PgPool,
    realm_id: i64,
    principal_id: i64,
    role_ids: &[i64],
    type_id: i64,
    resource_ids: Option<&[i64]>,
    ctx: &Json,
) -> Result<Vec<PermittedAction>, DataError> {
    sqlx::query_as::<_, PermittedAction>(
        "SELECT resource_id, action_id, is_type_level FROM permitted_actions($1, $2, $3, $4, $5, $6)",
    )
    .bind(realm_id)
    .bind(principal_id)
    .bind(role_ids)
    .bind(type_id)
    .bind(resource_ids)
    .bind(ctx)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterType {
    GrantedAll,
    DeniedAll,
    Conditions,
}

impl FilterType {
    fn parse(raw: &str) -> Self {
        match raw {
            "granted_all" => FilterType::GrantedAll,
            "denied_all" => FilterType::DeniedAll,
            _ => FilterType::Conditions,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConditionsForClient {
    pub filter_type: FilterType,
    pub conditions_dsl: Option<Json>,
    pub external_ids: Option<Vec<String>>,
    pub has_context_refs: bool,
}

/// Calls the `conditions_for_client` stored routine (§4.6).
pub async fn conditions_for_client(
    pool: &PgPool,
    realm_id: i64,
    principal_id: i64,
    role_ids: &[i64],
    type_id: i64,
    action_id: i64,
) -> Result<ConditionsForClient, DataError> {
    let row: (String, Option<Json>, Option<Vec<String>>, bool) = sqlx::query_as(
        "SELECT filter_type, conditions_dsl, external_ids, has_context_refs
         FROM conditions_for_client($1, $2, $3, $4, $5)",
    )
    .bind(realm_id)
    .bind(principal_id)
    .bind(role_ids)
    .bind(type_id)
    .bind(action_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;

    Ok(ConditionsForClient {
        filter_type: FilterType::parse(&row.0),
        conditions_dsl: row.1,
        external_ids: row.2,
        has_context_refs: row.3,
    })
}

/// Appends one audit row directly (used as the audit pipeline's fallback
/// path when the queue backend is unavailable, §6).
#[allow(clippy::too_many_arguments)]
pub async fn insert_audit_log(
    pool: &PgPool,
    realm_id: i64,
    principal_id: i64,
    action_name: Option<&str>,
    resource_type_name: Option<&str>,
    decision: bool,
    resource_ids: Option<&Json>,
    external_resource_ids: Option<&Json>,
) -> Result<(), DataError> {
    sqlx::query(
        "INSERT INTO authorization_log
            (realm_id, principal_id, action_name, resource_type_name, decision, resource_ids, external_resource_ids)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(realm_id)
    .bind(principal_id)
    .bind(action_name)
    .bind(resource_type_name)
    .bind(decision)
    .bind(resource_ids)
    .bind(external_resource_ids)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_data_error)?;
    Ok(())
}
