//! Axum router assembly for the authorization engine's HTTP API (§6).
//!
//! `authz-http` owns the wire shape only: request/response DTOs, bearer-token
//! resolution, and route wiring. All decision logic lives in `authz-engine`;
//! handlers here do nothing but translate and delegate.

pub mod auth;
pub mod dto;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use authz_core::health::{health_router, HealthIndicator};

pub use state::AppState;

/// Assembles the full application router: health probes (mounted as their
/// own self-contained sub-router, independent of [`AppState`]) plus the
/// decision, admin, and manifest surfaces that share it.
pub fn build_router(state: AppState, health_checks: Vec<Box<dyn HealthIndicator>>) -> Router {
    let api = Router::new()
        .route("/check-access", post(handlers::decisions::check_access_handler))
        .route("/get-permitted-actions", post(handlers::decisions::get_permitted_actions_handler))
        .route("/get-authorization-conditions", post(handlers::conditions::get_authorization_conditions_handler))
        .route("/manifest/apply", post(handlers::manifest::apply_manifest_handler))
        .route("/realms", post(handlers::admin::create_realm))
        .route("/realms/:realm/manifest", get(handlers::manifest::export_manifest_handler))
        .route("/realms/:realm", get(handlers::admin::get_realm).delete(handlers::admin::delete_realm))
        .route(
            "/realms/:realm/resource-types",
            get(handlers::admin::list_resource_types).post(handlers::admin::create_resource_type),
        )
        .route("/realms/:realm/resource-types/:type_id", axum::routing::delete(handlers::admin::delete_resource_type))
        .route("/realms/:realm/actions", get(handlers::admin::list_actions).post(handlers::admin::create_action))
        .route("/realms/:realm/actions/:action_id", axum::routing::delete(handlers::admin::delete_action))
        .route("/realms/:realm/roles", get(handlers::admin::list_roles).post(handlers::admin::upsert_role))
        .route("/realms/:realm/roles/:role_id", axum::routing::delete(handlers::admin::delete_role))
        .route(
            "/realms/:realm/principals",
            get(handlers::admin::list_principals).post(handlers::admin::upsert_principal),
        )
        .route("/realms/:realm/principals/:username", get(handlers::admin::get_principal))
        .route(
            "/realms/:realm/principals/id/:principal_id",
            axum::routing::delete(handlers::admin::delete_principal),
        )
        .route("/realms/:realm/resources", post(handlers::admin::create_resource))
        .route(
            "/realms/:realm/resources/:type_name/:resource_id",
            get(handlers::admin::get_resource)
                .patch(handlers::admin::update_resource)
                .delete(handlers::admin::delete_resource),
        )
        .route(
            "/realms/:realm/resources/external/:type_name/:external_id",
            get(handlers::admin::get_resource_by_external_id),
        )
        .route("/realms/:realm/acls", post(handlers::admin::upsert_acl))
        .route("/realms/:realm/acls/:type_name", get(handlers::admin::list_acls))
        .route("/realms/:realm/acls/:type_name/:acl_id", axum::routing::delete(handlers::admin::delete_acl))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Router::new().merge(health_router(health_checks)).merge(api)
}
