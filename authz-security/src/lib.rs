//! Bearer token resolution: validates a JWT against per-realm or
//! process-default material and maps it to an authenticated principal,
//! collapsing every failure to the anonymous principal (§4.9).

pub mod error;
pub mod jwt;
pub mod principal;

pub use error::SecurityError;
pub use jwt::{BoxFuture, DecodedClaims, PrincipalResolver, ResolvedPrincipal, TokenResolver};
pub use principal::{Principal, ANONYMOUS_PRINCIPAL_ID};
