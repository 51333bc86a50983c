//! CRUD surface over realms and their scoped entities (§6 "`/realms/...`
//! CRUD + batch create/update/delete"). Thin wrappers over `authz-store`'s
//! repository functions — no orchestration logic lives here, only name
//! resolution and wire shaping.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use authz_core::{AppError, AppResult};
use authz_store::repository::{acl, action, principal, realm, resource, resource_type, role};

use crate::state::AppState;

async fn realm_id_for(state: &AppState, realm_name: &str) -> Result<i64, AppError> {
    realm::find_by_name(&state.deps.pool, realm_name)
        .await?
        .map(|r| r.id)
        .ok_or_else(|| AppError::UnknownEntity(format!("realm {realm_name:?}")))
}

async fn resource_type_id_for(state: &AppState, realm_id: i64, type_name: &str) -> Result<i64, AppError> {
    resource_type::find_by_name(&state.deps.pool, realm_id, type_name)
        .await?
        .map(|rt| rt.id)
        .ok_or_else(|| AppError::UnknownEntity(format!("resource type {type_name:?}")))
}

// -- realms ----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRealmRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RealmResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

impl From<realm::RealmRow> for RealmResponse {
    fn from(row: realm::RealmRow) -> Self {
        RealmResponse { id: row.id, name: row.name, description: row.description, is_active: row.is_active }
    }
}

pub async fn create_realm(
    State(state): State<AppState>,
    Json(body): Json<CreateRealmRequest>,
) -> AppResult<Json<RealmResponse>> {
    let row = realm::create(&state.deps.pool, &body.name, body.description.as_deref()).await?;
    Ok(Json(row.into()))
}

pub async fn get_realm(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Json<RealmResponse>> {
    let row = realm::find_by_name(&state.deps.pool, &name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("realm {name:?}")))?;
    Ok(Json(row.into()))
}

pub async fn delete_realm(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Json<JsonValue>> {
    let realm_id = realm_id_for(&state, &name).await?;
    realm::delete(&state.deps.pool, realm_id).await?;
    state.deps.cache.invalidate_realm(&name).await;
    Ok(Json(serde_json::json!({"deleted": true})))
}

// -- resource types ----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateResourceTypeRequest {
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    pub attribute_schema: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct ResourceTypeResponse {
    pub id: i64,
    pub name: String,
    pub is_public: bool,
    pub attribute_schema: Option<JsonValue>,
}

impl From<resource_type::ResourceTypeRow> for ResourceTypeResponse {
    fn from(row: resource_type::ResourceTypeRow) -> Self {
        ResourceTypeResponse { id: row.id, name: row.name, is_public: row.is_public, attribute_schema: row.attribute_schema }
    }
}

pub async fn list_resource_types(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
) -> AppResult<Json<Vec<ResourceTypeResponse>>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let rows = resource_type::list_for_realm(&state.deps.pool, realm_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn create_resource_type(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
    Json(body): Json<CreateResourceTypeRequest>,
) -> AppResult<Json<ResourceTypeResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let row = resource_type::create(&state.deps.pool, realm_id, &body.name, body.is_public, body.attribute_schema.as_ref()).await?;
    state.deps.cache.invalidate_realm(&realm_name).await;
    Ok(Json(row.into()))
}

pub async fn delete_resource_type(
    State(state): State<AppState>,
    Path((realm_name, type_id)): Path<(String, i64)>,
) -> AppResult<Json<JsonValue>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    resource_type::delete(&state.deps.pool, realm_id, type_id).await?;
    state.deps.cache.invalidate_realm(&realm_name).await;
    Ok(Json(serde_json::json!({"deleted": true})))
}

// -- actions -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateActionRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub id: i64,
    pub name: String,
}

impl From<action::ActionRow> for ActionResponse {
    fn from(row: action::ActionRow) -> Self {
        ActionResponse { id: row.id, name: row.name }
    }
}

pub async fn list_actions(State(state): State<AppState>, Path(realm_name): Path<String>) -> AppResult<Json<Vec<ActionResponse>>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let rows = action::list_for_realm(&state.deps.pool, realm_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn create_action(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
    Json(body): Json<CreateActionRequest>,
) -> AppResult<Json<ActionResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let row = action::create(&state.deps.pool, realm_id, &body.name).await?;
    state.deps.cache.invalidate_realm(&realm_name).await;
    Ok(Json(row.into()))
}

pub async fn delete_action(
    State(state): State<AppState>,
    Path((realm_name, action_id)): Path<(String, i64)>,
) -> AppResult<Json<JsonValue>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    action::delete(&state.deps.pool, realm_id, action_id).await?;
    state.deps.cache.invalidate_realm(&realm_name).await;
    Ok(Json(serde_json::json!({"deleted": true})))
}

// -- roles -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpsertRoleRequest {
    pub name: String,
    pub attribute_mapping: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: i64,
    pub name: String,
    pub attribute_mapping: Option<JsonValue>,
}

impl From<role::RoleRow> for RoleResponse {
    fn from(row: role::RoleRow) -> Self {
        RoleResponse { id: row.id, name: row.name, attribute_mapping: row.attribute_mapping }
    }
}

pub async fn list_roles(State(state): State<AppState>, Path(realm_name): Path<String>) -> AppResult<Json<Vec<RoleResponse>>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let rows = role::list_for_realm(&state.deps.pool, realm_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn upsert_role(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
    Json(body): Json<UpsertRoleRequest>,
) -> AppResult<Json<RoleResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let row = role::upsert_with_mapping(&state.deps.pool, realm_id, &body.name, body.attribute_mapping.as_ref()).await?;
    state.deps.cache.invalidate_realm(&realm_name).await;
    Ok(Json(row.into()))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path((realm_name, role_id)): Path<(String, i64)>,
) -> AppResult<Json<JsonValue>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    role::delete(&state.deps.pool, realm_id, role_id).await?;
    state.deps.cache.invalidate_realm(&realm_name).await;
    Ok(Json(serde_json::json!({"deleted": true})))
}

// -- principals --------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpsertPrincipalRequest {
    pub username: String,
    #[serde(default)]
    pub attributes: JsonValue,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub id: i64,
    pub username: String,
    pub attributes: JsonValue,
}

impl From<principal::PrincipalRow> for PrincipalResponse {
    fn from(row: principal::PrincipalRow) -> Self {
        PrincipalResponse { id: row.id, username: row.username, attributes: row.attributes }
    }
}

pub async fn list_principals(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
) -> AppResult<Json<Vec<PrincipalResponse>>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let rows = principal::list_for_realm(&state.deps.pool, realm_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn get_principal(
    State(state): State<AppState>,
    Path((realm_name, username)): Path<(String, String)>,
) -> AppResult<Json<PrincipalResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let row = principal::find_by_username(&state.deps.pool, realm_id, &username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("principal {username:?}")))?;
    Ok(Json(row.into()))
}

pub async fn upsert_principal(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
    Json(body): Json<UpsertPrincipalRequest>,
) -> AppResult<Json<PrincipalResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let row = principal::upsert(&state.deps.pool, realm_id, &body.username, &body.attributes).await?;
    if let Some(roles) = &body.roles {
        principal::set_roles_by_name(&state.deps.pool, row.id, realm_id, roles).await?;
    }
    state.deps.cache.invalidate_principal(&realm_name, row.id, &row.username).await;
    Ok(Json(row.into()))
}

pub async fn delete_principal(
    State(state): State<AppState>,
    Path((realm_name, principal_id)): Path<(String, i64)>,
) -> AppResult<Json<JsonValue>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    principal::delete(&state.deps.pool, realm_id, principal_id).await?;
    state.deps.cache.invalidate_principal_roles(principal_id).await;
    Ok(Json(serde_json::json!({"deleted": true})))
}

// -- resources -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub attributes: JsonValue,
    pub geometry: Option<JsonValue>,
    pub external_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    pub id: i64,
    pub attributes: JsonValue,
}

impl From<resource::ResourceRow> for ResourceResponse {
    fn from(row: resource::ResourceRow) -> Self {
        ResourceResponse { id: row.id, attributes: row.attributes }
    }
}

pub async fn create_resource(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
    Json(body): Json<CreateResourceRequest>,
) -> AppResult<Json<ResourceResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let type_id = resource_type_id_for(&state, realm_id, &body.type_name).await?;
    let row = resource::create(
        &state.deps.pool, realm_id, type_id, &body.attributes, body.geometry.as_ref(), &realm_name, &body.type_name,
    )
    .await?;
    if let Some(ext) = &body.external_id {
        resource::attach_external_id(&state.deps.pool, realm_id, type_id, row.id, ext).await?;
    }
    state.deps.cache.invalidate_type_decisions(&realm_name).await;
    Ok(Json(row.into()))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path((realm_name, type_name, resource_id)): Path<(String, String, i64)>,
) -> AppResult<Json<ResourceResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let type_id = resource_type_id_for(&state, realm_id, &type_name).await?;
    let row = resource::find_by_id(&state.deps.pool, realm_id, type_id, resource_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("resource {resource_id}")))?;
    Ok(Json(row.into()))
}

pub async fn get_resource_by_external_id(
    State(state): State<AppState>,
    Path((realm_name, type_name, external_id)): Path<(String, String, String)>,
) -> AppResult<Json<ResourceResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let type_id = resource_type_id_for(&state, realm_id, &type_name).await?;
    let row = resource::find_by_external_id(&state.deps.pool, realm_id, type_id, &external_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("resource with external id {external_id:?}")))?;
    Ok(Json(row.into()))
}

#[derive(Debug, Deserialize)]
pub struct PatchResourceRequest {
    #[serde(default)]
    pub attributes: JsonValue,
    pub geometry: Option<JsonValue>,
}

pub async fn update_resource(
    State(state): State<AppState>,
    Path((realm_name, type_name, resource_id)): Path<(String, String, i64)>,
    Json(body): Json<PatchResourceRequest>,
) -> AppResult<Json<ResourceResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let type_id = resource_type_id_for(&state, realm_id, &type_name).await?;
    let row = resource::update_attributes(&state.deps.pool, realm_id, type_id, resource_id, &body.attributes, body.geometry.as_ref()).await?;
    state.deps.cache.invalidate_type_decisions(&realm_name).await;
    Ok(Json(row.into()))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Path((realm_name, type_name, resource_id)): Path<(String, String, i64)>,
) -> AppResult<Json<JsonValue>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let type_id = resource_type_id_for(&state, realm_id, &type_name).await?;
    resource::delete(&state.deps.pool, realm_id, type_id, resource_id).await?;
    state.deps.cache.invalidate_type_decisions(&realm_name).await;
    Ok(Json(serde_json::json!({"deleted": true})))
}

// -- ACLs ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpsertAclRequest {
    pub resource_type: String,
    pub action: String,
    #[serde(default)]
    pub principal_id: i64,
    #[serde(default)]
    pub role_id: i64,
    pub resource_id: Option<i64>,
    pub conditions: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct AclResponse {
    pub id: i64,
    pub action_id: i64,
    pub principal_id: Option<i64>,
    pub role_id: Option<i64>,
    pub resource_id: Option<i64>,
    pub conditions: Option<JsonValue>,
}

impl From<acl::AclRow> for AclResponse {
    fn from(row: acl::AclRow) -> Self {
        AclResponse {
            id: row.id,
            action_id: row.action_id,
            principal_id: row.principal_id,
            role_id: row.role_id,
            resource_id: row.resource_id,
            conditions: row.conditions,
        }
    }
}

pub async fn list_acls(
    State(state): State<AppState>,
    Path((realm_name, type_name)): Path<(String, String)>,
) -> AppResult<Json<Vec<AclResponse>>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let type_id = resource_type_id_for(&state, realm_id, &type_name).await?;
    let rows = acl::list_for_type(&state.deps.pool, realm_id, type_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn upsert_acl(
    State(state): State<AppState>,
    Path(realm_name): Path<String>,
    Json(body): Json<UpsertAclRequest>,
) -> AppResult<Json<AclResponse>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let type_id = resource_type_id_for(&state, realm_id, &body.resource_type).await?;
    let action_row = action::find_by_name(&state.deps.pool, realm_id, &body.action)
        .await?
        .ok_or_else(|| AppError::UnknownEntity(format!("action {:?}", body.action)))?;

    if let Some(conditions) = &body.conditions {
        authz_dsl::parse(conditions).map_err(|e| AppError::BadRequest(e.to_string()))?;
    }

    let row = acl::upsert(
        &state.deps.pool, realm_id, type_id, action_row.id, body.principal_id, body.role_id, body.resource_id,
        body.conditions.as_ref(), &realm_name, &body.resource_type,
    )
    .await?;
    state.deps.cache.invalidate_type_decisions(&realm_name).await;
    Ok(Json(row.into()))
}

pub async fn delete_acl(
    State(state): State<AppState>,
    Path((realm_name, type_name, acl_id)): Path<(String, String, i64)>,
) -> AppResult<Json<JsonValue>> {
    let realm_id = realm_id_for(&state, &realm_name).await?;
    let type_id = resource_type_id_for(&state, realm_id, &type_name).await?;
    acl::delete(&state.deps.pool, realm_id, type_id, acl_id).await?;
    state.deps.cache.invalidate_type_decisions(&realm_name).await;
    Ok(Json(serde_json::json!({"deleted": true})))
}
