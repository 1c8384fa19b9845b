//! Redirect Guard: one navigation policy for every layer.
//!
//! DESIGN
//! ======
//! `RedirectGuard::decide` is the only place that turns (route, session)
//! into a redirect. The HTTP middleware calls it with a request-scoped
//! session; the page guard calls it with the Session Store's subscription;
//! the auth forms go through `request_redirect`, which consults the same
//! Loop Breaker. A redirect is never issued while the session is unresolved.

pub mod page;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::loop_breaker::{Admission, LoopBreaker, RedirectKey};
use crate::session::{Session, SessionStatus};
use routes::{RouteClass, RouteTable, normalize_path};

pub const DEFAULT_LOGIN_ROUTE: &str = "/auth/login";
pub const DEFAULT_LANDING_ROUTE: &str = "/dashboard";
pub const DEFAULT_CALLBACK_PARAM: &str = "callbackUrl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum NavigationDecision {
    Allow,
    /// Send the visitor to the login page, remembering where they were going.
    RedirectToLogin { callback: String },
    RedirectToLanding,
    /// Redirects for this destination are looping; render in place instead.
    LoopDetected { destination: String },
}

/// A navigation event as seen by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Requested path, without query string.
    pub path: String,
    /// Callback query parameter, when the URL carries one.
    pub callback: Option<String>,
    /// Client identity used to key redirect records.
    pub identity: String,
}

impl Navigation {
    #[must_use]
    pub fn new(path: &str, identity: impl Into<String>) -> Self {
        Self { path: normalize_path(path), callback: None, identity: identity.into() }
    }

    #[must_use]
    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    /// Build from a raw `path?query` string, extracting `callback_param`.
    #[must_use]
    pub fn from_path_and_query(path_and_query: &str, callback_param: &str, identity: impl Into<String>) -> Self {
        let (path, query) = path_and_query
            .split_once('?')
            .unwrap_or((path_and_query, ""));
        let callback = url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == callback_param)
            .map(|(_, value)| value.into_owned());
        Self { path: normalize_path(path), callback, identity: identity.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub login_route: String,
    pub landing_route: String,
    pub callback_param: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_route: DEFAULT_LOGIN_ROUTE.into(),
            landing_route: DEFAULT_LANDING_ROUTE.into(),
            callback_param: DEFAULT_CALLBACK_PARAM.into(),
        }
    }
}

// =============================================================================
// GUARD
// =============================================================================

#[derive(Clone)]
pub struct RedirectGuard {
    routes: Arc<RouteTable>,
    breaker: LoopBreaker,
    config: Arc<GuardConfig>,
}

impl RedirectGuard {
    #[must_use]
    pub fn new(routes: RouteTable, breaker: LoopBreaker, config: GuardConfig) -> Self {
        Self { routes: Arc::new(routes), breaker, config: Arc::new(config) }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn breaker(&self) -> &LoopBreaker {
        &self.breaker
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Policy decision before the Loop Breaker is consulted.
    #[must_use]
    pub fn candidate(&self, nav: &Navigation, session: &Session) -> NavigationDecision {
        let status = session.status();
        if status == SessionStatus::Unknown {
            return NavigationDecision::Allow;
        }

        match (self.routes.classify(&nav.path), status) {
            (RouteClass::Protected, SessionStatus::Unauthenticated) => {
                NavigationDecision::RedirectToLogin { callback: nav.path.clone() }
            }
            (RouteClass::AuthOnly, SessionStatus::Authenticated) if !self.routes.is_terminal(&nav.path) => {
                if self.is_mid_login_flow(nav) {
                    NavigationDecision::Allow
                } else {
                    NavigationDecision::RedirectToLanding
                }
            }
            _ => NavigationDecision::Allow,
        }
    }

    /// Decide a navigation and, for redirects, admit it through the Loop
    /// Breaker keyed by the requested route. Suppressed redirects downgrade
    /// to `Allow`.
    #[must_use]
    pub fn decide(&self, nav: &Navigation, session: &Session, now: Instant) -> NavigationDecision {
        let candidate = self.candidate(nav, session);
        let destination = match &candidate {
            NavigationDecision::Allow | NavigationDecision::LoopDetected { .. } => return candidate,
            NavigationDecision::RedirectToLogin { .. } => self.config.login_route.clone(),
            NavigationDecision::RedirectToLanding => self.config.landing_route.clone(),
        };

        match self.request_redirect(&nav.identity, &nav.path, now) {
            Admission::Issue => {
                info!(path = %nav.path, %destination, identity = %nav.identity, "redirect issued");
                candidate
            }
            Admission::Suppress { retry_after } => {
                warn!(
                    path = %nav.path,
                    %destination,
                    identity = %nav.identity,
                    retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                    "redirect suppressed by cooldown"
                );
                NavigationDecision::Allow
            }
            Admission::LoopDetected => {
                warn!(path = %nav.path, %destination, identity = %nav.identity, "redirect loop detected");
                NavigationDecision::LoopDetected { destination }
            }
        }
    }

    /// Loop-Breaker admission for `(identity, route)`. The auth forms call
    /// this with the route they send the browser to after a sign-in.
    pub fn request_redirect(&self, identity: &str, route: &str, now: Instant) -> Admission {
        let key = RedirectKey::new(identity, normalize_path(route));
        self.breaker.admit(&key, now)
    }

    /// Where a decision sends the browser, as a relative URL.
    #[must_use]
    pub fn location(&self, decision: &NavigationDecision) -> Option<String> {
        match decision {
            NavigationDecision::RedirectToLogin { callback } => Some(self.login_url(callback)),
            NavigationDecision::RedirectToLanding => Some(self.config.landing_route.clone()),
            NavigationDecision::Allow | NavigationDecision::LoopDetected { .. } => None,
        }
    }

    /// `/auth/login?callbackUrl=<encoded callback>`.
    #[must_use]
    pub fn login_url(&self, callback: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.config.callback_param, callback)
            .finish();
        format!("{}?{query}", self.config.login_route)
    }

    /// Reduce a user-supplied callback to a safe same-origin destination.
    /// Anything that is not a plain relative path, or that points back at an
    /// auth-only page, becomes the landing route.
    #[must_use]
    pub fn sanitize_callback(&self, raw: Option<&str>) -> String {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return self.config.landing_route.clone();
        };
        let relative = raw.starts_with('/')
            && !raw.starts_with("//")
            && !raw.contains('\\')
            && !raw.chars().any(char::is_control);
        if !relative || self.routes.classify(raw) == RouteClass::AuthOnly {
            return self.config.landing_route.clone();
        }
        raw.to_owned()
    }

    fn is_mid_login_flow(&self, nav: &Navigation) -> bool {
        nav.callback.as_deref().is_some_and(|cb| {
            let target = self.sanitize_callback(Some(cb));
            target == cb.trim() && self.routes.classify(&target) == RouteClass::Protected
        })
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
