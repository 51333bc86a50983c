//! Wire shapes for the three decision endpoints (§6). These are kept
//! separate from `authz-engine`'s domain types so the orchestrator never
//! carries a `serde` dependency on types it only reasons about internally.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use authz_engine::{
    AccessAnswer, AccessItem, AccessResult, CheckAccessRequest, PermittedActionsItem,
    PermittedActionsRequest, PermittedActionsResult, ReturnType,
};
use authz_store::repository::authorization::{ConditionsForClient, FilterType};

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireReturnType {
    Decision,
    IdList,
}

impl From<WireReturnType> for ReturnType {
    fn from(value: WireReturnType) -> Self {
        match value {
            WireReturnType::Decision => ReturnType::Decision,
            WireReturnType::IdList => ReturnType::IdList,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireAccessItem {
    #[serde(rename = "type")]
    pub type_name: String,
    pub action: String,
    #[serde(default)]
    pub external_resource_ids: Option<Vec<String>>,
    #[serde(default = "default_return_type")]
    pub return_type: WireReturnType,
}

fn default_return_type() -> WireReturnType {
    WireReturnType::Decision
}

impl From<WireAccessItem> for AccessItem {
    fn from(item: WireAccessItem) -> Self {
        AccessItem {
            type_name: item.type_name,
            action_name: item.action,
            external_resource_ids: item.external_resource_ids,
            return_type: item.return_type.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckAccessWireRequest {
    pub realm: String,
    #[serde(default)]
    pub role_names: Option<Vec<String>>,
    pub items: Vec<WireAccessItem>,
    #[serde(default)]
    pub context: Json,
}

impl CheckAccessWireRequest {
    pub fn into_domain(self) -> CheckAccessRequest {
        CheckAccessRequest {
            realm_name: self.realm,
            role_names: self.role_names,
            items: self.items.into_iter().map(AccessItem::from).collect(),
            auth_context: self.context,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "return_type", rename_all = "snake_case")]
pub enum WireAnswer {
    Decision { granted: bool },
    IdList { resource_ids: Vec<String> },
}

impl From<AccessAnswer> for WireAnswer {
    fn from(value: AccessAnswer) -> Self {
        match value {
            AccessAnswer::Decision(granted) => WireAnswer::Decision { granted },
            AccessAnswer::IdList(resource_ids) => WireAnswer::IdList { resource_ids },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessResultWire {
    #[serde(rename = "type")]
    pub type_name: String,
    pub action: String,
    #[serde(flatten)]
    pub answer: WireAnswer,
}

impl From<AccessResult> for AccessResultWire {
    fn from(result: AccessResult) -> Self {
        AccessResultWire {
            type_name: result.type_name,
            action: result.action_name,
            answer: result.answer.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PermittedActionsWireItem {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub external_resource_ids: Option<Vec<String>>,
}

impl From<PermittedActionsWireItem> for PermittedActionsItem {
    fn from(item: PermittedActionsWireItem) -> Self {
        PermittedActionsItem {
            type_name: item.type_name,
            external_resource_ids: item.external_resource_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PermittedActionsWireRequest {
    pub realm: String,
    #[serde(default)]
    pub role_names: Option<Vec<String>>,
    pub items: Vec<PermittedActionsWireItem>,
    #[serde(default)]
    pub context: Json,
}

impl PermittedActionsWireRequest {
    pub fn into_domain(self) -> PermittedActionsRequest {
        PermittedActionsRequest {
            realm_name: self.realm,
            role_names: self.role_names,
            items: self.items.into_iter().map(PermittedActionsItem::from).collect(),
            auth_context: self.context,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PermittedActionsResultWire {
    #[serde(rename = "type")]
    pub type_name: String,
    pub external_id: Option<String>,
    pub actions: Vec<String>,
}

impl From<PermittedActionsResult> for PermittedActionsResultWire {
    fn from(result: PermittedActionsResult) -> Self {
        PermittedActionsResultWire {
            type_name: result.type_name,
            external_id: result.external_id,
            actions: result.action_names,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConditionsWireRequest {
    pub realm: String,
    #[serde(default)]
    pub role_names: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub action: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFilterType {
    GrantedAll,
    DeniedAll,
    Conditions,
}

impl From<&FilterType> for WireFilterType {
    fn from(value: &FilterType) -> Self {
        match value {
            FilterType::GrantedAll => WireFilterType::GrantedAll,
            FilterType::DeniedAll => WireFilterType::DeniedAll,
            FilterType::Conditions => WireFilterType::Conditions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConditionsWireResponse {
    pub filter_type: WireFilterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<Vec<String>>,
    pub has_context_refs: bool,
}

impl From<ConditionsForClient> for ConditionsWireResponse {
    fn from(value: ConditionsForClient) -> Self {
        ConditionsWireResponse {
            filter_type: (&value.filter_type).into(),
            conditions: value.conditions_dsl,
            external_ids: value.external_ids,
            has_context_refs: value.has_context_refs,
        }
    }
}
