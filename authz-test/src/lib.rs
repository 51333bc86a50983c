//! In-process test harness shared by every crate's integration tests: an
//! HTTP client over `tower::oneshot` ([`app::TestApp`]), a real-Postgres
//! fixture bootstrap ([`fixtures`]), and HS256 token minting for exercising
//! authenticated requests without standing up a full identity provider
//! ([`token`]).

pub mod app;
pub mod fixtures;
pub mod token;

pub use app::{TestApp, TestResponse};
pub use fixtures::{create_test_realm, connect_test_pool, test_router, test_state, TestRealm, TEST_JWT_SECRET};
pub use token::mint_test_token;
