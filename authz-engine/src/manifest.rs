//! Declarative manifest apply/export (§6.5 "external collaborator" — the
//! wire endpoints that drive it live in `authz-http`). Grounded on the
//! reference service's section-by-section batch apply: each top-level
//! section is idempotent on its own terms (create-if-missing, update-if-
//! present, or skip-if-present depending on the section) and the realm's
//! `mode` only governs the realm row itself.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{info, warn};

use authz_cache::Cache;
use authz_core::AppError;
use authz_store::repository::{acl, action, principal, realm, resource, resource_type, role};

/// How the realm row itself is reconciled against the manifest's `realm`
/// section. Every other section behaves the same regardless of mode
/// (§6.5 "Modes: replace/create/update").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestMode {
    Replace,
    Create,
    Update,
}

impl std::str::FromStr for ManifestMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(ManifestMode::Replace),
            "create" => Ok(ManifestMode::Create),
            "update" => Ok(ManifestMode::Update),
            other => Err(AppError::BadRequest(format!("unknown manifest mode {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestRealm {
    pub name: String,
    pub description: Option<String>,
    pub keycloak_config: Option<Json>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestResourceType {
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    pub attribute_schema: Option<Json>,
}

/// An action may be given as a bare string or as `{"name": "..."}` (§6.5,
/// mirroring the reference service's `item if isinstance(item, str) else item["name"]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestAction {
    Name(String),
    Object { name: String },
}

impl ManifestAction {
    fn name(&self) -> &str {
        match self {
            ManifestAction::Name(n) => n,
            ManifestAction::Object { name } => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestRole {
    pub name: String,
    pub attribute_mapping: Option<Json>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestPrincipal {
    pub username: String,
    pub attributes: Option<Json>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestResource {
    #[serde(rename = "type")]
    pub type_name: String,
    pub external_id: Option<String>,
    pub attributes: Option<Json>,
    pub geometry: Option<Json>,
    pub srid: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestAcl {
    pub resource_type: String,
    pub action: String,
    pub role: Option<String>,
    pub principal: Option<String>,
    pub principal_id: Option<i64>,
    pub resource_external_id: Option<String>,
    pub conditions: Option<Json>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestDocument {
    pub realm: ManifestRealm,
    #[serde(default)]
    pub resource_types: Vec<ManifestResourceType>,
    #[serde(default)]
    pub actions: Vec<ManifestAction>,
    #[serde(default)]
    pub roles: Vec<ManifestRole>,
    #[serde(default)]
    pub principals: Vec<ManifestPrincipal>,
    #[serde(default)]
    pub resources: Vec<ManifestResource>,
    #[serde(default)]
    pub acls: Vec<ManifestAcl>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CountReport {
    pub created: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AclReport {
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestApplyReport {
    pub realm: String,
    pub resource_types: CountReport,
    pub actions: CountReport,
    pub roles: CountReport,
    pub principals: CountReport,
    pub resources: ResourceReport,
    pub acls: AclReport,
}

/// Injects an explicit SRID into a geometry value that doesn't already
/// carry one, without changing the shape `authz_store::geometry::parse`
/// expects (§3.1 "manifest and CRUD surfaces must round-trip [geometry]").
fn geometry_with_srid(geometry: &Json, srid: Option<i32>) -> Json {
    let Some(srid) = srid else { return geometry.clone() };

    if let Some(s) = geometry.as_str() {
        if s.trim().to_uppercase().starts_with("SRID=") {
            return geometry.clone();
        }
        return Json::String(format!("SRID={srid};{s}"));
    }

    if let Some(obj) = geometry.as_object() {
        if obj.contains_key("crs") {
            return geometry.clone();
        }
        let mut obj = obj.clone();
        obj.insert(
            "crs".to_string(),
            serde_json::json!({"type": "name", "properties": {"name": format!("EPSG:{srid}")}}),
        );
        return Json::Object(obj);
    }

    geometry.clone()
}

/// Apply a manifest document to a realm (§6.5). Sections run in dependency
/// order: resource types, actions, and roles before principals; principals
/// before resources; resources before ACLs — both the partition manager and
/// the foreign-key graph require it.
pub async fn apply_manifest(
    pool: &sqlx::PgPool,
    cache: &Cache,
    doc: ManifestDocument,
    mode: ManifestMode,
) -> Result<ManifestApplyReport, AppError> {
    let realm_name = doc.realm.name.clone();
    info!(
        realm = %realm_name, mode = ?mode,
        resource_types = doc.resource_types.len(), actions = doc.actions.len(),
        roles = doc.roles.len(), principals = doc.principals.len(),
        resources = doc.resources.len(), acls = doc.acls.len(),
        "applying manifest"
    );

    let realm_row = reconcile_realm(pool, &doc.realm, mode).await?;
    let realm_id = realm_row.id;

    let mut rt_report = CountReport::default();
    for item in &doc.resource_types {
        let existing = resource_type::find_by_name(pool, realm_id, &item.name).await?;
        resource_type::upsert(pool, realm_id, &item.name, item.is_public, item.attribute_schema.as_ref()).await?;
        if existing.is_some() {
            rt_report.updated += 1;
        } else {
            rt_report.created += 1;
        }
    }

    let mut action_report = CountReport::default();
    for item in &doc.actions {
        let existing = action::find_by_name(pool, realm_id, item.name()).await?;
        action::create_if_missing(pool, realm_id, item.name()).await?;
        if existing.is_none() {
            action_report.created += 1;
        }
    }

    let mut role_report = CountReport::default();
    for item in &doc.roles {
        let existing = role::find_by_name(pool, realm_id, &item.name).await?;
        role::upsert_with_mapping(pool, realm_id, &item.name, item.attribute_mapping.as_ref()).await?;
        if existing.is_some() {
            role_report.updated += 1;
        } else {
            role_report.created += 1;
        }
    }

    // §6.5: principals are created-if-missing, never updated by a manifest
    // re-apply — an existing username is left exactly as it is.
    let mut principal_report = CountReport::default();
    for item in &doc.principals {
        if principal::find_by_username(pool, realm_id, &item.username).await?.is_some() {
            continue;
        }
        let attributes = item.attributes.clone().unwrap_or_else(|| serde_json::json!({}));
        let row = principal::upsert(pool, realm_id, &item.username, &attributes).await?;
        if !item.roles.is_empty() {
            principal::set_roles_by_name(pool, row.id, realm_id, &item.roles).await?;
        }
        principal_report.created += 1;
    }

    let type_ids = resource_type::list_for_realm(pool, realm_id)
        .await?
        .into_iter()
        .map(|rt| (rt.name, rt.id))
        .collect::<HashMap<_, _>>();

    // §6.5: resources are keyed by external_id within their type — present
    // means update its attributes/geometry, absent means insert.
    let mut resource_report = ResourceReport::default();
    for item in &doc.resources {
        let Some(&type_id) = type_ids.get(&item.type_name) else {
            warn!(realm = %realm_name, resource_type = %item.type_name, "manifest resource references unknown type, skipping");
            resource_report.skipped += 1;
            continue;
        };

        let geometry = item.geometry.as_ref().map(|g| geometry_with_srid(g, item.srid));
        let attributes = item.attributes.clone().unwrap_or_else(|| serde_json::json!({}));

        let existing = match &item.external_id {
            Some(ext) => resource::find_by_external_id(pool, realm_id, type_id, ext).await?,
            None => None,
        };

        match existing {
            Some(row) => {
                resource::update_attributes(pool, realm_id, type_id, row.id, &attributes, geometry.as_ref()).await?;
                resource_report.updated += 1;
            }
            None => {
                let row = resource::create(pool, realm_id, type_id, &attributes, geometry.as_ref(), &realm_name, &item.type_name).await?;
                if let Some(ext) = &item.external_id {
                    resource::attach_external_id(pool, realm_id, type_id, row.id, ext).await?;
                }
                resource_report.created += 1;
            }
        }
    }

    let action_ids = action::list_for_realm(pool, realm_id)
        .await?
        .into_iter()
        .map(|a| (a.name, a.id))
        .collect::<HashMap<_, _>>();
    let role_ids = role::list_for_realm(pool, realm_id)
        .await?
        .into_iter()
        .map(|r| (r.name, r.id))
        .collect::<HashMap<_, _>>();

    let mut acl_report = AclReport::default();
    for item in &doc.acls {
        let Some(&type_id) = type_ids.get(&item.resource_type) else {
            acl_report.skipped += 1;
            continue;
        };
        let Some(&action_id) = action_ids.get(&item.action) else {
            acl_report.skipped += 1;
            continue;
        };

        let role_id = item.role.as_deref().and_then(|name| role_ids.get(name).copied()).unwrap_or(0);

        let principal_id = if let Some(name) = &item.principal {
            if name == "anonymous" {
                0
            } else {
                match principal::find_by_username(pool, realm_id, name).await? {
                    Some(row) => row.id,
                    None => {
                        acl_report.skipped += 1;
                        continue;
                    }
                }
            }
        } else {
            item.principal_id.unwrap_or(0)
        };

        let resource_id = match &item.resource_external_id {
            Some(ext) => match resource::find_by_external_id(pool, realm_id, type_id, ext).await? {
                Some(row) => Some(row.id),
                None => {
                    acl_report.skipped += 1;
                    continue;
                }
            },
            None => None,
        };

        if let Some(conditions) = &item.conditions {
            authz_dsl::parse(conditions).map_err(|e| AppError::BadRequest(e.to_string()))?;
        }

        acl::upsert(
            pool, realm_id, type_id, action_id, principal_id, role_id, resource_id,
            item.conditions.as_ref(), &realm_name, &item.resource_type,
        )
        .await?;
        acl_report.created += 1;
    }

    cache.invalidate_realm(&realm_name).await;

    info!(
        realm = %realm_name,
        resource_types = ?rt_report, actions = ?action_report, roles = ?role_report,
        principals = ?principal_report, resources = ?resource_report, acls = ?acl_report,
        "manifest applied"
    );

    Ok(ManifestApplyReport {
        realm: realm_name,
        resource_types: rt_report,
        actions: action_report,
        roles: role_report,
        principals: principal_report,
        resources: resource_report,
        acls: acl_report,
    })
}

async fn reconcile_realm(
    pool: &sqlx::PgPool,
    declared: &ManifestRealm,
    mode: ManifestMode,
) -> Result<realm::RealmRow, AppError> {
    if mode == ManifestMode::Replace {
        if let Some(existing) = realm::find_by_name(pool, &declared.name).await? {
            realm::delete(pool, existing.id).await?;
            info!(realm = %declared.name, "deleted existing realm for replace mode");
        }
    }

    match realm::find_by_name(pool, &declared.name).await? {
        Some(existing) if mode == ManifestMode::Create => {
            warn!(realm = %declared.name, "realm already exists, skipping creation (create mode)");
            Ok(existing)
        }
        Some(existing) => {
            Ok(realm::update(pool, existing.id, declared.description.as_deref(), declared.keycloak_config.as_ref()).await?)
        }
        None => {
            Ok(realm::create_full(
                pool,
                &declared.name,
                declared.description.as_deref(),
                None,
                None,
                declared.keycloak_config.as_ref(),
            )
            .await?)
        }
    }
}

/// Dump a realm's declarative configuration back out (§6.5 "inverse: dump
/// realm state"), in the same document shape [`apply_manifest`] accepts.
pub async fn export_manifest(pool: &sqlx::PgPool, realm_name: &str) -> Result<Json, AppError> {
    let realm_row = realm::find_by_name(pool, realm_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("realm {realm_name:?}")))?;

    let mut manifest = serde_json::json!({
        "realm": {
            "name": realm_row.name,
            "description": realm_row.description,
        }
    });
    if let Some(kc) = &realm_row.keycloak_config {
        manifest["realm"]["keycloak_config"] = kc.clone();
    }

    let resource_types = resource_type::list_for_realm(pool, realm_row.id).await?;
    if !resource_types.is_empty() {
        manifest["resource_types"] = serde_json::json!(resource_types
            .iter()
            .map(|rt| serde_json::json!({"name": rt.name, "is_public": rt.is_public, "attribute_schema": rt.attribute_schema}))
            .collect::<Vec<_>>());
    }

    let actions = action::list_for_realm(pool, realm_row.id).await?;
    if !actions.is_empty() {
        manifest["actions"] = serde_json::json!(actions.iter().map(|a| a.name.clone()).collect::<Vec<_>>());
    }

    let roles = role::list_for_realm(pool, realm_row.id).await?;
    if !roles.is_empty() {
        manifest["roles"] = serde_json::json!(roles
            .iter()
            .map(|r| serde_json::json!({"name": r.name, "attribute_mapping": r.attribute_mapping}))
            .collect::<Vec<_>>());
    }

    let principals = principal::list_for_realm(pool, realm_row.id).await?;
    if !principals.is_empty() {
        let mut out = Vec::with_capacity(principals.len());
        for p in &principals {
            let role_ids = principal::role_ids(pool, p.id).await?;
            let role_names: Vec<&str> = roles.iter().filter(|r| role_ids.contains(&r.id)).map(|r| r.name.as_str()).collect();
            out.push(serde_json::json!({
                "username": p.username,
                "attributes": p.attributes,
                "roles": role_names,
            }));
        }
        manifest["principals"] = serde_json::json!(out);
    }

    let mut all_resources = Vec::new();
    for rt in &resource_types {
        let rows = resource::list_for_type_export(pool, realm_row.id, rt.id).await?;
        for row in rows {
            let mut entry = serde_json::json!({"type": rt.name, "attributes": row.attributes});
            if let Some(ext) = &row.external_id {
                entry["external_id"] = serde_json::json!(ext);
            }
            if let Some(ewkt) = &row.geometry_ewkt {
                entry["geometry"] = serde_json::json!(ewkt);
            }
            all_resources.push((rt.id, row.id, row.external_id, entry));
        }
    }
    if !all_resources.is_empty() {
        manifest["resources"] = serde_json::json!(all_resources.iter().map(|(_, _, _, e)| e.clone()).collect::<Vec<_>>());
    }

    let resource_ext_by_id: HashMap<(i64, i64), String> = all_resources
        .into_iter()
        .filter_map(|(type_id, id, ext, _)| ext.map(|ext| ((type_id, id), ext)))
        .collect();

    let mut acl_entries = Vec::new();
    for rt in &resource_types {
        for row in acl::list_for_type(pool, realm_row.id, rt.id).await? {
            let Some(action) = actions.iter().find(|a| a.id == row.action_id) else { continue };
            let mut entry = serde_json::json!({"resource_type": rt.name, "action": action.name});
            if let Some(role_id) = row.role_id {
                if let Some(role) = roles.iter().find(|r| r.id == role_id) {
                    entry["role"] = serde_json::json!(role.name);
                }
            } else if let Some(principal_id) = row.principal_id {
                entry["principal"] = if principal_id == 0 {
                    serde_json::json!("anonymous")
                } else if let Some(p) = principals.iter().find(|p| p.id == principal_id) {
                    serde_json::json!(p.username)
                } else {
                    serde_json::json!(null)
                };
            }
            if let Some(resource_id) = row.resource_id {
                if let Some(ext) = resource_ext_by_id.get(&(rt.id, resource_id)) {
                    entry["resource_external_id"] = serde_json::json!(ext);
                }
            }
            if let Some(conditions) = &row.conditions {
                entry["conditions"] = conditions.clone();
            }
            acl_entries.push(entry);
        }
    }
    if !acl_entries.is_empty() {
        manifest["acls"] = serde_json::json!(acl_entries);
    }

    Ok(manifest)
}
