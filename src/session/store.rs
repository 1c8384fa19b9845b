//! Session Store: single source of truth for authentication status.
//!
//! ARCHITECTURE
//! ============
//! The store owns the cached `Session` and an identity client. Reads are
//! synchronous and never touch the network. Mutations go through the
//! identity service and land as `SessionEvent`s; every change is pushed to
//! subscribers through a `watch` channel before the mutating call returns.
//!
//! ORDERING
//! ========
//! Each identity call reads the generation number under the state lock.
//! Only authoritative changes bump it: sign-in (when it starts and when it
//! lands), sign-up and sign-out. A refresh never bumps it, so a lookup can
//! not supersede a sign-in; a refresh response that arrives after any
//! authoritative change is discarded instead of overwriting newer state. The
//! lock is never held across an `.await`.
//!
//! Refreshes are coalesced: one in flight suppresses new ones, and a
//! minimum interval between network calls absorbs bursts from several
//! consumers refreshing at once. In-flight flags are cleared by a drop
//! guard, so a cancelled call never wedges the store.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Session, SessionEvent, SessionStatus};
use crate::identity::{AuthError, IdentityService, SessionTokens, SignUpOutcome};

pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Minimum spacing between two identity-service session lookups.
    pub refresh_debounce: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { refresh_debounce: Duration::from_millis(DEFAULT_REFRESH_DEBOUNCE_MS) }
    }
}

/// Email + password pair submitted by the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub struct SessionStore {
    identity: Arc<dyn IdentityService>,
    config: StoreConfig,
    state: Mutex<StoreState>,
    tx: watch::Sender<Session>,
}

struct StoreState {
    session: Session,
    /// Bumped by sign-in, sign-up and sign-out. Refreshes only read it.
    generation: u64,
    refresh_in_flight: bool,
    last_refresh: Option<Instant>,
    sign_in_in_flight: bool,
}

impl SessionStore {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityService>, config: StoreConfig) -> Self {
        let (tx, _) = watch::channel(Session::unknown());
        Self {
            identity,
            config,
            state: Mutex::new(StoreState {
                session: Session::unknown(),
                generation: 0,
                refresh_in_flight: false,
                last_refresh: None,
                sign_in_in_flight: false,
            }),
            tx,
        }
    }

    /// Cached session. Never blocks on I/O.
    #[must_use]
    pub fn get_session(&self) -> Session {
        self.lock().session.clone()
    }

    /// Receiver that observes every session transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Tokens held by the underlying identity client.
    #[must_use]
    pub fn tokens(&self) -> Option<SessionTokens> {
        self.identity.tokens()
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityService> {
        &self.identity
    }

    /// Ask the identity service for the current session.
    ///
    /// Returns immediately when a refresh is already in flight or the last
    /// one started less than the debounce interval ago.
    ///
    /// # Errors
    ///
    /// Returns the classified identity error. The cached session is left
    /// untouched on error, so an unresolved store stays `Unknown`.
    pub async fn refresh_session(&self) -> Result<(), AuthError> {
        let (generation, in_flight) = {
            let mut st = self.lock();
            if st.refresh_in_flight {
                debug!("session refresh coalesced with in-flight call");
                return Ok(());
            }
            let now = Instant::now();
            if st
                .last_refresh
                .is_some_and(|last| now.saturating_duration_since(last) < self.config.refresh_debounce)
            {
                debug!("session refresh debounced");
                return Ok(());
            }
            st.refresh_in_flight = true;
            st.last_refresh = Some(now);
            (st.generation, InFlight::new(self, |st| st.refresh_in_flight = false))
        };

        let result = self.identity.get_session().await;

        let mut st = self.lock();
        in_flight.release(&mut st);
        match result {
            Ok(_) if st.generation != generation => {
                debug!(generation, current = st.generation, "stale session refresh discarded");
                Ok(())
            }
            Ok(found) => {
                let event = match (found, st.session.status()) {
                    (Some(auth), _) => SessionEvent::Resolved(Some(auth.user.principal())),
                    (None, SessionStatus::Authenticated) => SessionEvent::Expired,
                    (None, _) => SessionEvent::Resolved(None),
                };
                self.transition(&mut st, event);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed");
                Err(AuthError::from(e))
            }
        }
    }

    /// Password sign-in. A second call while one is in flight fails fast
    /// with [`AuthError::InProgress`].
    ///
    /// # Errors
    ///
    /// Returns the classified identity error.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let (generation, in_flight) = {
            let mut st = self.lock();
            if st.sign_in_in_flight {
                return Err(AuthError::InProgress);
            }
            st.sign_in_in_flight = true;
            st.generation += 1;
            (st.generation, InFlight::new(self, |st| st.sign_in_in_flight = false))
        };

        let result = self
            .identity
            .sign_in_with_password(&credentials.email, &credentials.password)
            .await;

        let mut st = self.lock();
        in_flight.release(&mut st);
        let auth = result.map_err(|e| {
            debug!(error = %e, "sign-in rejected");
            AuthError::from(e)
        })?;
        if st.generation != generation {
            warn!(generation, current = st.generation, "sign-in superseded by a later session change");
            return Err(AuthError::Unknown("sign-in superseded".into()));
        }
        info!(principal = %auth.user.id, "signed in");
        st.generation += 1;
        self.transition(&mut st, SessionEvent::SignedIn(auth.user.principal()));
        Ok(st.session.clone())
    }

    /// Register a new account. When the identity service auto-confirms and
    /// returns a session, the store transitions to `Authenticated`.
    ///
    /// # Errors
    ///
    /// Returns the classified identity error.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, AuthError> {
        let generation = {
            let mut st = self.lock();
            st.generation += 1;
            st.generation
        };

        let outcome = self
            .identity
            .sign_up(email, password, metadata)
            .await
            .map_err(AuthError::from)?;

        if let Some(session) = &outcome.session {
            let mut st = self.lock();
            if st.generation == generation {
                info!(principal = %session.user.id, "signed up with immediate session");
                st.generation += 1;
                self.transition(&mut st, SessionEvent::SignedIn(session.user.principal()));
            }
        }
        Ok(outcome)
    }

    /// Clear the local session, then revoke it remotely. Remote failures are
    /// logged, never returned: local state is already cleared.
    pub async fn sign_out(&self) {
        {
            let mut st = self.lock();
            st.generation += 1;
            self.transition(&mut st, SessionEvent::SignedOut);
        }
        if let Err(e) = self.identity.sign_out().await {
            warn!(error = %e, "remote sign-out failed; local session already cleared");
        }
    }

    fn transition(&self, st: &mut StoreState, event: SessionEvent) {
        let next = st.session.clone().apply(event);
        if next != st.session {
            debug!(from = ?st.session.status(), to = ?next.status(), "session transition");
            st.session = next.clone();
            self.tx.send_replace(next);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// =============================================================================
// IN-FLIGHT GUARD
// =============================================================================

/// Clears an in-flight flag when the call completes or its future is dropped.
struct InFlight<'a> {
    store: &'a SessionStore,
    clear: fn(&mut StoreState),
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(store: &'a SessionStore, clear: fn(&mut StoreState)) -> Self {
        Self { store, clear, armed: true }
    }

    /// Clear the flag under a lock the caller already holds.
    fn release(mut self, st: &mut StoreState) {
        (self.clear)(st);
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("in-flight identity call cancelled");
            (self.clear)(&mut self.store.lock());
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
