use authz_core::AppError;

/// Token-resolution errors. Every variant here, per §4.9, collapses to the
/// anonymous principal at the call site rather than propagating — kept as
/// a distinct type so the resolver's internal branching stays legible and
/// testable without committing to that collapse inside the type itself.
#[derive(Debug)]
pub enum SecurityError {
    MissingToken,
    InvalidToken(String),
    UnknownRealm(String),
    UnknownPrincipal(String),
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::MissingToken => write!(f, "missing bearer token"),
            SecurityError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            SecurityError::UnknownRealm(name) => write!(f, "unknown realm: {name}"),
            SecurityError::UnknownPrincipal(sub) => write!(f, "unknown principal: {sub}"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        AppError::TokenInvalid(err.to_string())
    }
}
