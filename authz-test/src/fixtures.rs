//! Test-database bootstrap: connect to a real Postgres instance named by
//! `TEST_DATABASE_URL` (falling back to `DATABASE_URL`), apply migrations
//! once, and hand out realms under a random name per test so parallel tests
//! never collide on the same row.

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use uuid::Uuid;

use authz_audit::AuditQueue;
use authz_cache::Cache;
use authz_engine::{CachingPrincipalResolver, EngineDeps};
use authz_security::TokenResolver;
use authz_store::repository::realm;

pub const TEST_JWT_SECRET: &str = "authz-test-harness-secret";

pub async fn connect_test_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("TEST_DATABASE_URL or DATABASE_URL must be set to run authz-test integration tests");

    let pool = PgPool::connect(&url).await.expect("failed to connect to test database");
    authz_store::pool::migrate(&pool).await.expect("failed to apply migrations to test database");
    pool
}

/// A realm created for the duration of one test, deleted on drop of the
/// returned guard's `cleanup` call (the caller must await it explicitly —
/// async `Drop` doesn't exist, so this is not automatic).
pub struct TestRealm {
    pub id: i64,
    pub name: String,
}

pub async fn create_test_realm(pool: &PgPool) -> TestRealm {
    let name = format!("test_realm_{}", Uuid::new_v4().simple());
    let row = realm::create(pool, &name, Some("authz-test fixture realm"))
        .await
        .expect("failed to create test realm");
    TestRealm { id: row.id, name }
}

impl TestRealm {
    pub async fn cleanup(&self, pool: &PgPool) {
        let _ = realm::delete(pool, self.id).await;
    }
}

/// Assemble an [`authz_http::AppState`] over an in-memory cache, suitable
/// for any test that doesn't itself exercise cache eviction semantics.
pub fn test_state(pool: PgPool) -> authz_http::AppState {
    let cache = Cache::in_memory();
    let audit = AuditQueue::new(None, "audit_queue", pool.clone());
    let deps = EngineDeps::new(pool.clone(), cache.clone(), audit);
    let token_resolver = TokenResolver::new(TEST_JWT_SECRET, "HS256").expect("valid default test jwt config");
    let principal_resolver = Arc::new(CachingPrincipalResolver::new(pool, cache));
    authz_http::AppState::new(deps, token_resolver, principal_resolver)
}

/// Full router over a fresh in-memory cache, with no health indicators —
/// tests exercising `/health` should build their own via `authz_core::health`.
pub fn test_router(pool: PgPool) -> Router {
    authz_http::build_router(test_state(pool), Vec::new())
}
