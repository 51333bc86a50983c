//! Identity-provider synchronization: a cron-driven scheduler that pulls
//! roles, users, and group memberships from an external IdP into the
//! realm's own role/principal tables (§6.5). Kept behind [`IdpAdapter`] so
//! the orchestrator never depends on a specific wire protocol.

pub mod adapter;
pub mod config;
pub mod keycloak;
pub mod scheduler;

pub use adapter::{BoxFuture, IdpAdapter, IdpUser, SyncError};
pub use config::KeycloakConfig;
pub use keycloak::KeycloakAdapter;
pub use scheduler::{sync_realm, IdpSyncScheduler};
