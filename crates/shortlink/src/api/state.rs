//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::SessionAuthenticator;
use crate::store::LinkStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Login flow and session gate.
    pub auth: Arc<SessionAuthenticator>,
    /// Links and membership sets.
    pub store: LinkStore,
    /// Where unknown keys are sent. `None` answers 404.
    pub default_redirect_url: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        auth: Arc<SessionAuthenticator>,
        store: LinkStore,
        default_redirect_url: Option<String>,
    ) -> Self {
        Self {
            auth,
            store,
            default_redirect_url: default_redirect_url
                .filter(|url| !url.is_empty())
                .map(Arc::from),
        }
    }
}

impl FromRef<AppState> for Arc<SessionAuthenticator> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
