//! Auth Forms: login and signup submission.
//!
//! DESIGN
//! ======
//! A submission validates locally, calls the Session Store, then asks the
//! Redirect Guard for one redirect through the shared Loop Breaker. A form
//! redirect that races with a guard-issued redirect for the same
//! destination is suppressed and reported as `SignedIn`.
//!
//! UNCONFIRMED EMAIL
//! =================
//! Business rule, not a security boundary: when sign-in fails because the
//! address is unconfirmed, the form signs out, re-registers the account with
//! `auto_confirm` metadata, and retries sign-in once. Only the retry's error
//! reaches the user.
//!
//! Profile sync runs after a successful sign-in and never fails it.

pub mod validate;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::ErrorCode;
use crate::guard::RedirectGuard;
use crate::identity::AuthError;
use crate::loop_breaker::Admission;
use crate::profile::ProfileSync;
use crate::session::store::Credentials;
use crate::session::{Principal, Session, SessionStore};
use validate::{validate_login, validate_signup};

pub const DEFAULT_PASSWORD_MIN_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormConfig {
    pub password_min_len: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self { password_min_len: DEFAULT_PASSWORD_MIN_LEN }
    }
}

// =============================================================================
// FIELDS & RESULTS
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginFields {
    pub email: String,
    pub password: String,
    /// Where to go after sign-in; sanitized before use.
    #[serde(default, alias = "callbackUrl")]
    pub callback: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupFields {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "confirmPassword")]
    pub confirm_password: String,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
}

/// Field name -> user-facing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FormResult {
    /// Signed in; navigate to `to`.
    Redirect { to: String },
    /// Signed in, but a redirect for the destination was just issued elsewhere.
    SignedIn,
    /// Account created; the user must confirm their address before signing in.
    ConfirmationRequired { email: String },
    Invalid { errors: FieldErrors },
    Failed { code: &'static str, message: String, retryable: bool },
    /// Signed in, but redirects to the destination are looping.
    LoopDetected,
}

impl FormResult {
    fn failed(err: &AuthError) -> Self {
        Self::Failed { code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }
}

// =============================================================================
// FORMS
// =============================================================================

pub struct AuthForms {
    store: Arc<SessionStore>,
    guard: RedirectGuard,
    profiles: Option<Arc<dyn ProfileSync>>,
    config: FormConfig,
    /// Client identity used to key form-initiated redirects.
    identity: String,
}

impl AuthForms {
    #[must_use]
    pub fn new(store: Arc<SessionStore>, guard: RedirectGuard, config: FormConfig, identity: impl Into<String>) -> Self {
        Self { store, guard, profiles: None, config, identity: identity.into() }
    }

    #[must_use]
    pub fn with_profiles(mut self, profiles: Option<Arc<dyn ProfileSync>>) -> Self {
        self.profiles = profiles;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn submit_login(&self, fields: &LoginFields) -> FormResult {
        let credentials = match validate_login(fields, &self.config) {
            Ok(c) => c,
            Err(errors) => return FormResult::Invalid { errors },
        };

        let signed_in = match self.store.sign_in(&credentials).await {
            Err(AuthError::EmailUnconfirmed) => self.remediate_unconfirmed(&credentials).await,
            other => other,
        };
        let session = match signed_in {
            Ok(session) => session,
            Err(e) => return self.report_failure(&e),
        };

        self.after_sign_in(&session, None).await;
        let target = self.guard.sanitize_callback(fields.callback.as_deref());
        self.redirect(&target)
    }

    pub async fn submit_signup(&self, fields: &SignupFields) -> FormResult {
        let request = match validate_signup(fields, &self.config) {
            Ok(r) => r,
            Err(errors) => return FormResult::Invalid { errors },
        };

        let metadata = match &request.full_name {
            Some(name) => serde_json::json!({ "full_name": name }),
            None => serde_json::json!({}),
        };
        let outcome = match self.store.sign_up(&request.email, &request.password, metadata).await {
            Ok(o) => o,
            Err(e) => return self.report_failure(&e),
        };

        if outcome.session.is_none() {
            info!(email = %request.email, "sign-up awaiting email confirmation");
            return FormResult::ConfirmationRequired { email: request.email };
        }

        let session = self.store.get_session();
        self.after_sign_in(&session, request.full_name.as_deref()).await;
        let landing = self.guard.config().landing_route.clone();
        self.redirect(&landing)
    }

    async fn remediate_unconfirmed(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        warn!(email = %credentials.email, "email unconfirmed; re-registering with auto-confirm");
        self.store.sign_out().await;

        let metadata = serde_json::json!({ "auto_confirm": true });
        match self.store.sign_up(&credentials.email, &credentials.password, metadata).await {
            Ok(outcome) if outcome.session.is_some() => return Ok(self.store.get_session()),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "re-registration failed; retrying sign-in anyway"),
        }

        self.store.sign_in(credentials).await
    }

    async fn after_sign_in(&self, session: &Session, full_name: Option<&str>) {
        if let Err(e) = self.store.refresh_session().await {
            debug!(error = %e, "post sign-in refresh failed; keeping signed-in session");
        }
        if let Some(principal) = session.principal() {
            self.sync_profile(principal, full_name).await;
        }
    }

    async fn sync_profile(&self, principal: &Principal, full_name: Option<&str>) {
        let Some(profiles) = &self.profiles else {
            return;
        };
        if let Err(e) = profiles.ensure_profile(principal, full_name).await {
            warn!(principal = %principal.id, code = e.error_code(), error = %e, "profile sync failed");
        }
    }

    fn redirect(&self, target: &str) -> FormResult {
        match self.guard.request_redirect(&self.identity, target, Instant::now()) {
            Admission::Issue => {
                info!(to = %target, identity = %self.identity, "form redirect issued");
                FormResult::Redirect { to: target.to_owned() }
            }
            Admission::Suppress { .. } => {
                debug!(to = %target, "form redirect suppressed; one is already in flight");
                FormResult::SignedIn
            }
            Admission::LoopDetected => {
                warn!(to = %target, identity = %self.identity, "form redirect loop detected");
                FormResult::LoopDetected
            }
        }
    }

    fn report_failure(&self, err: &AuthError) -> FormResult {
        match err {
            AuthError::Unknown(detail) => error!(identity = %self.identity, %detail, "unclassified auth failure"),
            other => debug!(identity = %self.identity, error = %other, "auth submission failed"),
        }
        FormResult::failed(err)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
