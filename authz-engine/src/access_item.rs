//! Domain types for the orchestrator's two entry points (§4.7, §4.8). Wire
//! (de)serialization lives in `authz-http`; these are the shapes the
//! orchestrator itself reasons about.

use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Decision,
    IdList,
}

#[derive(Debug, Clone)]
pub struct AccessItem {
    pub type_name: String,
    pub action_name: String,
    pub external_resource_ids: Option<Vec<String>>,
    pub return_type: ReturnType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessAnswer {
    Decision(bool),
    IdList(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct AccessResult {
    pub type_name: String,
    pub action_name: String,
    pub answer: AccessAnswer,
}

#[derive(Debug, Clone)]
pub struct CheckAccessRequest {
    pub realm_name: String,
    pub role_names: Option<Vec<String>>,
    pub items: Vec<AccessItem>,
    pub auth_context: Json,
}

#[derive(Debug, Clone)]
pub struct PermittedActionsItem {
    pub type_name: String,
    pub external_resource_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct PermittedActionsResult {
    pub type_name: String,
    /// External id this set of actions applies to; `None` for the
    /// "no external ids supplied" type-level-only case (§4.8).
    pub external_id: Option<String>,
    pub action_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PermittedActionsRequest {
    pub realm_name: String,
    pub role_names: Option<Vec<String>>,
    pub items: Vec<PermittedActionsItem>,
    pub auth_context: Json,
}
