//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the process-wide pieces: configuration, the identity connector, the
//! Redirect Guard (and with it the one Loop Breaker every request shares),
//! and optional profile sync. Session Stores are request-scoped and built
//! from the connector with the request's cookie tokens.

use std::sync::Arc;

use crate::config::GateConfig;
use crate::forms::AuthForms;
use crate::guard::RedirectGuard;
use crate::guard::page::PageGuard;
use crate::identity::{IdentityConnector, SessionTokens};
use crate::loop_breaker::LoopBreaker;
use crate::profile::ProfileSync;
use crate::session::SessionStore;

/// Clone is required by Axum; every field is Arc-wrapped or a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub connector: Arc<dyn IdentityConnector>,
    pub guard: RedirectGuard,
    pub profiles: Option<Arc<dyn ProfileSync>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: GateConfig,
        connector: Arc<dyn IdentityConnector>,
        profiles: Option<Arc<dyn ProfileSync>>,
    ) -> Self {
        let breaker = LoopBreaker::new(config.loop_breaker);
        let guard = RedirectGuard::new(config.routes.clone(), breaker, config.guard.clone());
        Self { config: Arc::new(config), connector, guard, profiles }
    }

    /// A Session Store for one request, seeded with its cookie tokens.
    #[must_use]
    pub fn session_store(&self, tokens: Option<SessionTokens>) -> Arc<SessionStore> {
        Arc::new(SessionStore::new(self.connector.connect(tokens), self.config.store))
    }

    /// Page guard subscribed to `store`; callers wait up to `config.max_wait`.
    #[must_use]
    pub fn page_guard(&self, store: &SessionStore) -> PageGuard {
        PageGuard::new(self.guard.clone(), store)
    }

    /// Auth forms bound to `store`, keying redirects by `client_identity`.
    #[must_use]
    pub fn auth_forms(&self, store: Arc<SessionStore>, client_identity: &str) -> AuthForms {
        AuthForms::new(store, self.guard.clone(), self.config.forms, client_identity)
            .with_profiles(self.profiles.clone())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_uses_configured_routes_and_breaker() {
        let state = test_helpers::test_app_state(Arc::new(test_helpers::MockIdentity::new()));
        assert_eq!(state.guard.config().landing_route, state.config.guard.landing_route);
        assert_eq!(state.guard.breaker().config(), state.config.loop_breaker);
        assert!(state.profiles.is_none());
    }

    #[test]
    fn clones_share_one_loop_breaker() {
        let state = test_helpers::test_app_state(Arc::new(test_helpers::MockIdentity::new()));
        let other = state.clone();
        let now = std::time::Instant::now();
        assert_eq!(state.guard.request_redirect("ip:1", "/dashboard", now), crate::loop_breaker::Admission::Issue);
        assert_eq!(other.guard.breaker().len(), 1);
    }

    #[test]
    fn session_store_seeds_connector_with_tokens() {
        let identity = Arc::new(test_helpers::MockIdentity::new());
        let connector = Arc::new(test_helpers::MockConnector::new(identity));
        let state = AppState::new(test_helpers::test_config(), connector.clone(), None);
        let tokens = test_helpers::auth_session("u1", "a@b.io").tokens;

        let store = state.session_store(Some(tokens.clone()));
        assert_eq!(store.get_session(), crate::session::Session::unknown());
        assert_eq!(connector.seeded.lock().unwrap().as_slice(), &[Some(tokens)]);
    }
}
