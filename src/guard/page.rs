//! Client-side page guard: wait for the session to resolve, then decide.
//!
//! A page that mounts before the Session Store has resolved waits on the
//! store's subscription for at most `max_wait`. The wait is an ordinary
//! future, so navigating away (dropping it) cancels it; nothing fires
//! against a page that is gone.

use std::time::{Duration, Instant};

use tokio::sync::watch;

use super::{Navigation, NavigationDecision, RedirectGuard};
use crate::session::{Session, SessionStore};

pub const DEFAULT_MAX_WAIT_MS: u64 = 3_000;

pub struct PageGuard {
    guard: RedirectGuard,
    sessions: watch::Receiver<Session>,
}

impl PageGuard {
    #[must_use]
    pub fn new(guard: RedirectGuard, store: &SessionStore) -> Self {
        Self { guard, sessions: store.subscribe() }
    }

    /// Decide once the session leaves `Unknown`, or after `max_wait` with
    /// whatever state is current (an unresolved session still defers).
    pub async fn await_decision(&mut self, nav: &Navigation, max_wait: Duration) -> NavigationDecision {
        let resolved = match tokio::time::timeout(max_wait, self.sessions.wait_for(Session::is_resolved)).await {
            Ok(Ok(session)) => Some(session.clone()),
            Ok(Err(_)) | Err(_) => None,
        };
        let session = resolved.unwrap_or_else(|| self.sessions.borrow().clone());
        if !session.is_resolved() {
            tracing::debug!(path = %nav.path, "session unresolved after max wait; deferring");
        }
        self.guard.decide(nav, &session, Instant::now())
    }
}

#[cfg(test)]
#[path = "page_test.rs"]
mod tests;
