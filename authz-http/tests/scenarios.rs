//! End-to-end scenarios over the assembled router, driven through the wire
//! API exactly as a real client would. Each test stands up its own realm
//! (parallel-safe: `authz_test::create_test_realm` names realms randomly)
//! against a real Postgres/PostGIS instance named by `TEST_DATABASE_URL` (or
//! `DATABASE_URL`).

use http::StatusCode;
use serde_json::json;

use authz_test::{connect_test_pool, create_test_realm, mint_test_token, test_router, TestApp};

async fn create_resource_type(app: &TestApp, realm: &str, name: &str, is_public: bool) {
    app.post_json(&format!("/realms/{realm}/resource-types"), &json!({"name": name, "is_public": is_public}))
        .await
        .assert_ok();
}

async fn create_action(app: &TestApp, realm: &str, name: &str) {
    app.post_json(&format!("/realms/{realm}/actions"), &json!({"name": name})).await.assert_ok();
}

async fn create_principal(app: &TestApp, realm: &str, username: &str, attributes: serde_json::Value) -> i64 {
    app.post_json(&format!("/realms/{realm}/principals"), &json!({"username": username, "attributes": attributes}))
        .await
        .assert_ok()
        .json::<serde_json::Value>()["id"]
        .as_i64()
        .unwrap()
}

async fn create_resource(app: &TestApp, realm: &str, type_name: &str, attributes: serde_json::Value, external_id: &str) -> i64 {
    app.post_json(
        &format!("/realms/{realm}/resources"),
        &json!({"type": type_name, "attributes": attributes, "external_id": external_id}),
    )
    .await
    .assert_ok()
    .json::<serde_json::Value>()["id"]
        .as_i64()
        .unwrap()
}

async fn create_resource_with_geometry(app: &TestApp, realm: &str, type_name: &str, geometry: serde_json::Value, external_id: &str) -> i64 {
    app.post_json(
        &format!("/realms/{realm}/resources"),
        &json!({"type": type_name, "attributes": {}, "geometry": geometry, "external_id": external_id}),
    )
    .await
    .assert_ok()
    .json::<serde_json::Value>()["id"]
        .as_i64()
        .unwrap()
}

#[allow(clippy::too_many_arguments)]
async fn upsert_acl(
    app: &TestApp,
    realm: &str,
    resource_type: &str,
    action: &str,
    principal_id: i64,
    role_id: i64,
    resource_id: Option<i64>,
    conditions: Option<serde_json::Value>,
) {
    app.post_json(
        &format!("/realms/{realm}/acls"),
        &json!({
            "resource_type": resource_type,
            "action": action,
            "principal_id": principal_id,
            "role_id": role_id,
            "resource_id": resource_id,
            "conditions": conditions,
        }),
    )
    .await
    .assert_ok();
}

async fn create_role(app: &TestApp, realm: &str, name: &str) -> i64 {
    app.post_json(&format!("/realms/{realm}/roles"), &json!({"name": name, "attribute_mapping": null}))
        .await
        .assert_ok()
        .json::<serde_json::Value>()["id"]
        .as_i64()
        .unwrap()
}

async fn assign_roles(app: &TestApp, realm: &str, username: &str, attributes: serde_json::Value, roles: &[&str]) -> i64 {
    app.post_json(
        &format!("/realms/{realm}/principals"),
        &json!({"username": username, "attributes": attributes, "roles": roles}),
    )
    .await
    .assert_ok()
    .json::<serde_json::Value>()["id"]
        .as_i64()
        .unwrap()
}

/// S1: `resource.security_level <= $principal.level`, only the resource
/// whose level is numerically within the principal's clearance is granted.
#[tokio::test]
async fn s1_numeric_comparison_grants_only_matching_resource() {
    let pool = connect_test_pool().await;
    let realm = create_test_realm(&pool).await;
    let app = TestApp::new(test_router(pool.clone()));

    create_resource_type(&app, &realm.name, "Document", false).await;
    create_action(&app, &realm.name, "read").await;
    let user_a = create_principal(&app, &realm.name, "UserA", json!({"level": "05"})).await;

    create_resource(&app, &realm.name, "Document", json!({"security_level": "03"}), "DOC-LEVEL-03").await;
    create_resource(&app, &realm.name, "Document", json!({"security_level": "10"}), "DOC-LEVEL-10").await;

    upsert_acl(
        &app, &realm.name, "Document", "read", user_a, 0, None,
        Some(json!({"op": "<=", "source": "resource", "attr": "security_level", "val": "$principal.level"})),
    )
    .await;

    let token = mint_test_token(user_a, None);
    let response = app
        .post_json_authenticated(
            "/check-access",
            &json!({
                "realm": realm.name,
                "items": [{"type": "Document", "action": "read", "external_resource_ids": ["DOC-LEVEL-03", "DOC-LEVEL-10"], "return_type": "id_list"}],
                "context": {},
            }),
            &token,
        )
        .await
        .assert_ok();

    let results: serde_json::Value = response.json();
    assert_eq!(results[0]["resource_ids"], json!(["DOC-LEVEL-03"]));

    realm.cleanup(&pool).await;
}

/// S2: a public resource type grants any caller, including anonymous,
/// access to any existing resource of that type; a private type with no
/// ACL grants nothing.
#[tokio::test]
async fn s2_public_type_short_circuits_for_anonymous_caller() {
    let pool = connect_test_pool().await;
    let realm = create_test_realm(&pool).await;
    let app = TestApp::new(test_router(pool.clone()));

    create_resource_type(&app, &realm.name, "public_image", true).await;
    create_resource_type(&app, &realm.name, "private_image", false).await;
    create_action(&app, &realm.name, "view").await;

    create_resource(&app, &realm.name, "public_image", json!({}), "img-1").await;
    create_resource(&app, &realm.name, "private_image", json!({}), "img-2").await;

    let response = app
        .post_json(
            "/check-access",
            &json!({
                "realm": realm.name,
                "items": [{"type": "public_image", "action": "view", "external_resource_ids": ["img-1"], "return_type": "id_list"}],
                "context": {},
            }),
        )
        .await
        .assert_ok();
    let results: serde_json::Value = response.json();
    assert_eq!(results[0]["resource_ids"], json!(["img-1"]));

    let response = app
        .post_json(
            "/check-access",
            &json!({
                "realm": realm.name,
                "items": [{"type": "private_image", "action": "view", "external_resource_ids": ["img-2"], "return_type": "id_list"}],
                "context": {},
            }),
        )
        .await
        .assert_ok();
    let results: serde_json::Value = response.json();
    assert_eq!(results[0]["resource_ids"], json!([]));

    realm.cleanup(&pool).await;
}

/// S3: an anonymous-scoped ACL (`principal_id=0, role_id=0`) tied to one
/// specific resource grants only that resource, only for the action it
/// names.
#[tokio::test]
async fn s3_anonymous_acl_scoped_to_single_resource() {
    let pool = connect_test_pool().await;
    let realm = create_test_realm(&pool).await;
    let app = TestApp::new(test_router(pool.clone()));

    create_resource_type(&app, &realm.name, "doc", false).await;
    create_action(&app, &realm.name, "view").await;
    create_action(&app, &realm.name, "download").await;

    let public_doc = create_resource(&app, &realm.name, "doc", json!({}), "public-doc").await;
    create_resource(&app, &realm.name, "doc", json!({}), "restricted-doc").await;

    upsert_acl(&app, &realm.name, "doc", "view", 0, 0, Some(public_doc), None).await;

    let view = app
        .post_json(
            "/check-access",
            &json!({
                "realm": realm.name,
                "items": [
                    {"type": "doc", "action": "view", "external_resource_ids": ["public-doc"], "return_type": "decision"},
                    {"type": "doc", "action": "view", "external_resource_ids": ["restricted-doc"], "return_type": "decision"},
                    {"type": "doc", "action": "download", "external_resource_ids": ["public-doc"], "return_type": "decision"},
                ],
                "context": {},
            }),
        )
        .await
        .assert_ok()
        .json::<serde_json::Value>();

    assert_eq!(view[0]["granted"], json!(true), "view public-doc should be granted");
    assert_eq!(view[1]["granted"], json!(false), "view restricted-doc should be denied");
    assert_eq!(view[2]["granted"], json!(false), "download public-doc should be denied");

    realm.cleanup(&pool).await;
}

/// S4: a `role_names` filter that names a role the principal does not hold
/// fails closed, even when an ACL grants that role.
#[tokio::test]
async fn s4_role_filter_intersection_fails_closed() {
    let pool = connect_test_pool().await;
    let realm = create_test_realm(&pool).await;
    let app = TestApp::new(test_router(pool.clone()));

    create_resource_type(&app, &realm.name, "project", false).await;
    create_action(&app, &realm.name, "edit").await;
    let unowned_role_id = create_role(&app, &realm.name, "UnownedRole").await;

    let principal_id = assign_roles(&app, &realm.name, "bob", json!({}), &["OwnedRole"]).await;
    create_resource(&app, &realm.name, "project", json!({}), "proj-1").await;

    upsert_acl(&app, &realm.name, "project", "edit", 0, unowned_role_id, None, None).await;

    let token = mint_test_token(principal_id, None);
    let response = app
        .post_json_authenticated(
            "/check-access",
            &json!({
                "realm": realm.name,
                "role_names": ["UnownedRole"],
                "items": [{"type": "project", "action": "edit", "return_type": "decision"}],
                "context": {},
            }),
            &token,
        )
        .await
        .assert_ok()
        .json::<serde_json::Value>();

    assert_eq!(response[0]["granted"], json!(false));

    realm.cleanup(&pool).await;
}

/// S5: a `st_dwithin` condition against a context-supplied point grants a
/// resource near the origin and denies one far away. The context location
/// is passed as WKT already in the engine's fixed projected SRID (meters) —
/// `$context.*` refs are read back verbatim, unlike a resource's own
/// geometry column which is reprojected on ingest.
#[tokio::test]
async fn s5_spatial_dwithin_grants_nearby_point() {
    let pool = connect_test_pool().await;
    let realm = create_test_realm(&pool).await;
    let app = TestApp::new(test_router(pool.clone()));

    create_resource_type(&app, &realm.name, "site", false).await;
    create_action(&app, &realm.name, "enter").await;

    create_resource_with_geometry(&app, &realm.name, "site", json!([0.0, 0.0]), "near-origin").await;

    upsert_acl(
        &app, &realm.name, "site", "enter", 0, 0, None,
        Some(json!({
            "op": "st_dwithin",
            "source": "resource",
            "attr": "geometry",
            "val": "$context.location",
            "args": 5000,
        })),
    )
    .await;

    let nearby = app
        .post_json(
            "/check-access",
            &json!({
                "realm": realm.name,
                "items": [{"type": "site", "action": "enter", "external_resource_ids": ["near-origin"], "return_type": "decision"}],
                "context": {"location": "POINT(3000 3000)"},
            }),
        )
        .await
        .assert_ok()
        .json::<serde_json::Value>();
    assert_eq!(nearby[0]["granted"], json!(true));

    let far = app
        .post_json(
            "/check-access",
            &json!({
                "realm": realm.name,
                "items": [{"type": "site", "action": "enter", "external_resource_ids": ["near-origin"], "return_type": "decision"}],
                "context": {"location": "POINT(50000 50000)"},
            }),
        )
        .await
        .assert_ok()
        .json::<serde_json::Value>();
    assert_eq!(far[0]["granted"], json!(false));

    realm.cleanup(&pool).await;
}

/// S6: a type-level ACL granting `view` to role `viewer` is still visible
/// through `/get-permitted-actions` for an external id that does not exist.
#[tokio::test]
async fn s6_permitted_actions_fallback_for_nonexistent_resource() {
    let pool = connect_test_pool().await;
    let realm = create_test_realm(&pool).await;
    let app = TestApp::new(test_router(pool.clone()));

    create_resource_type(&app, &realm.name, "document", false).await;
    create_action(&app, &realm.name, "view").await;
    let viewer_role = create_role(&app, &realm.name, "viewer").await;

    upsert_acl(&app, &realm.name, "document", "view", 0, viewer_role, None, None).await;

    let principal_id = assign_roles(&app, &realm.name, "carol", json!({}), &["viewer"]).await;
    let token = mint_test_token(principal_id, None);

    let response = app
        .post_json_authenticated(
            "/get-permitted-actions",
            &json!({
                "realm": realm.name,
                "items": [{"type": "document", "external_resource_ids": ["DOC-DOES-NOT-EXIST"]}],
                "context": {},
            }),
            &token,
        )
        .await
        .assert_ok()
        .json::<serde_json::Value>();

    assert_eq!(response[0]["actions"], json!(["view"]));

    realm.cleanup(&pool).await;
}

/// `/get-authorization-conditions` (§4.6): an ACL with a condition attached
/// comes back as `filter_type: conditions` carrying the DSL verbatim, so a
/// client can fuse it into its own query instead of round-tripping ids.
#[tokio::test]
async fn conditions_for_client_returns_dsl_for_conditional_acl() {
    let pool = connect_test_pool().await;
    let realm = create_test_realm(&pool).await;
    let app = TestApp::new(test_router(pool.clone()));

    create_resource_type(&app, &realm.name, "Document", false).await;
    create_action(&app, &realm.name, "read").await;
    let principal_id = create_principal(&app, &realm.name, "dana", json!({"level": "05"})).await;

    let condition = json!({"op": "<=", "source": "resource", "attr": "security_level", "val": "$principal.level"});
    upsert_acl(&app, &realm.name, "Document", "read", principal_id, 0, None, Some(condition.clone())).await;

    let token = mint_test_token(principal_id, None);
    let response = app
        .post_json_authenticated(
            "/get-authorization-conditions",
            &json!({"realm": realm.name, "type": "Document", "action": "read"}),
            &token,
        )
        .await
        .assert_ok()
        .json::<serde_json::Value>();

    assert_eq!(response["filter_type"], json!("conditions"));
    assert!(response["has_context_refs"], "a $principal ref counts as a context ref the routine flags");
    assert!(response["conditions"].is_object(), "conditions DSL should be echoed back verbatim");

    realm.cleanup(&pool).await;
}

/// Manifest apply (§6.5) creates a realm's full state from one document, and
/// export (§6, inverse of apply) reports it back out with the same names.
#[tokio::test]
async fn manifest_apply_then_export_round_trips_realm_state() {
    let pool = connect_test_pool().await;
    let app = TestApp::new(test_router(pool.clone()));
    let realm_name = format!("manifest-test-{}", uuid::Uuid::new_v4());

    let doc = json!({
        "realm": {"name": realm_name, "description": "manifest scenario", "keycloak_config": null},
        "resource_types": [{"name": "widget", "is_public": false, "attribute_schema": null}],
        "actions": ["use"],
        "roles": [{"name": "operator", "attribute_mapping": null}],
        "principals": [{"username": "erin", "attributes": {}, "roles": ["operator"]}],
        "resources": [{"type": "widget", "external_id": "widget-1", "attributes": {}, "geometry": null, "srid": null}],
        "acls": [{
            "resource_type": "widget",
            "action": "use",
            "role": "operator",
            "principal": null,
            "principal_id": null,
            "resource_external_id": null,
            "conditions": null,
        }],
    });

    let report = app
        .post_json("/manifest/apply?mode=create", &doc)
        .await
        .assert_ok()
        .json::<serde_json::Value>();
    assert_eq!(report["resource_types"]["created"], json!(1));
    assert_eq!(report["acls"]["created"], json!(1));

    let exported = app
        .get(&format!("/realms/{realm_name}/manifest"))
        .await
        .assert_ok()
        .json::<serde_json::Value>();
    assert_eq!(exported["realm"]["name"], json!(realm_name));
    assert_eq!(exported["resource_types"][0]["name"], json!("widget"));

    let principal_id = app
        .get(&format!("/realms/{realm_name}/principals/erin"))
        .await
        .assert_ok()
        .json::<serde_json::Value>()["id"]
        .as_i64()
        .unwrap();
    let token = mint_test_token(principal_id, None);
    let decision = app
        .post_json_authenticated(
            "/check-access",
            &json!({
                "realm": realm_name,
                "items": [{"type": "widget", "action": "use", "external_resource_ids": ["widget-1"], "return_type": "decision"}],
                "context": {},
            }),
            &token,
        )
        .await
        .assert_ok()
        .json::<serde_json::Value>();
    assert_eq!(decision[0]["granted"], json!(true));

    let realm_row = authz_store::repository::realm::find_by_name(&pool, &realm_name).await.unwrap().unwrap();
    authz_store::repository::realm::delete(&pool, realm_row.id).await.unwrap();
}

/// Unknown realm name is a 400, not a 500 (§6 "Error codes").
#[tokio::test]
async fn unknown_realm_is_bad_request() {
    let pool = connect_test_pool().await;
    let app = TestApp::new(test_router(pool));

    app.post_json(
        "/check-access",
        &json!({
            "realm": "no-such-realm-at-all",
            "items": [{"type": "x", "action": "y", "return_type": "decision"}],
            "context": {},
        }),
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);
}

/// §4.9: a token's `realm` claim overrides the hint realm for principal
/// lookup. Two realms each have a principal named `alice` with a different
/// `level` attribute; the request names `realm_a` but the token carries
/// `realm: realm_b`. The decision only comes out `true` if `realm_b`'s
/// `alice` (level 20) was the one actually resolved and matched against the
/// condition — `realm_a`'s `alice` (level 1) would deny.
#[tokio::test]
async fn check_access_honors_realm_claim_override_for_principal_lookup() {
    let pool = connect_test_pool().await;
    let realm_a = create_test_realm(&pool).await;
    let realm_b = create_test_realm(&pool).await;
    let app = TestApp::new(test_router(pool.clone()));

    create_principal(&app, &realm_a.name, "alice", json!({"level": 1})).await;
    create_principal(&app, &realm_b.name, "alice", json!({"level": 20})).await;

    create_resource_type(&app, &realm_a.name, "Document", false).await;
    create_action(&app, &realm_a.name, "read").await;
    create_resource(&app, &realm_a.name, "Document", json!({"security_level": 10}), "DOC-10").await;

    upsert_acl(
        &app, &realm_a.name, "Document", "read", 0, 0, None,
        Some(json!({"op": "<=", "source": "resource", "attr": "security_level", "val": "$principal.level"})),
    )
    .await;

    let token = mint_test_token(0, Some(json!({"sub": "alice", "realm": realm_b.name})));
    let decision = app
        .post_json_authenticated(
            "/check-access",
            &json!({
                "realm": realm_a.name,
                "items": [{"type": "Document", "action": "read", "external_resource_ids": ["DOC-10"], "return_type": "decision"}],
                "context": {},
            }),
            &token,
        )
        .await
        .assert_ok()
        .json::<serde_json::Value>();
    assert_eq!(decision[0]["granted"], json!(true));

    realm_a.cleanup(&pool).await;
    realm_b.cleanup(&pool).await;
}
