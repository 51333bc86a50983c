use std::sync::Arc;

use authz_engine::EngineDeps;
use authz_security::{PrincipalResolver, TokenResolver};

#[derive(Clone)]
pub struct AppState {
    pub deps: EngineDeps,
    pub token_resolver: Arc<TokenResolver>,
    pub principal_resolver: Arc<dyn PrincipalResolver>,
}

impl AppState {
    pub fn new(deps: EngineDeps, token_resolver: TokenResolver, principal_resolver: Arc<dyn PrincipalResolver>) -> Self {
        AppState {
            deps,
            token_resolver: Arc::new(token_resolver),
            principal_resolver,
        }
    }
}
