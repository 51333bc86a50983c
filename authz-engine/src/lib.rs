//! The request orchestrator (§4.7, §4.8, §4.6): realm resolution, effective
//! role computation, batched external-id resolution, and the per-item
//! decision fan-out, wired together behind the two public entry points
//! client code (`authz-http`) actually calls.

pub mod access_item;
pub mod check_access;
pub mod conditions;
pub mod deps;
pub mod external_ids;
pub mod manifest;
pub mod permitted_actions;
pub mod principal_resolver;
pub mod realm;
pub mod roles;

pub use access_item::{
    AccessAnswer, AccessItem, AccessResult, CheckAccessRequest, PermittedActionsItem,
    PermittedActionsRequest, PermittedActionsResult, ReturnType,
};
pub use check_access::check_access;
pub use conditions::{get_authorization_conditions, ConditionsForClientView};
pub use deps::EngineDeps;
pub use manifest::{apply_manifest, export_manifest, ManifestDocument, ManifestMode};
pub use permitted_actions::get_permitted_actions;
pub use principal_resolver::CachingPrincipalResolver;
