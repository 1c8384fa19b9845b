//! Session model and state machine.
//!
//! DESIGN
//! ======
//! `Session` can only be built through its constructors, so a principal is
//! present exactly when the status is `Authenticated`. Transitions are driven
//! by discrete `SessionEvent`s through [`Session::apply`]; `Unknown` is the
//! start state and is never re-entered once resolved.

pub mod store;

use serde::{Deserialize, Serialize};

pub use store::{SessionStore, StoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Identity service has not answered yet.
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// The authenticated user, as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque identity-service user id.
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    status: SessionStatus,
    principal: Option<Principal>,
}

/// Discrete triggers for session transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The identity service answered a session lookup.
    Resolved(Option<Principal>),
    SignedIn(Principal),
    SignedOut,
    /// The identity service rejected the stored tokens.
    Expired,
}

impl Session {
    #[must_use]
    pub fn unknown() -> Self {
        Self { status: SessionStatus::Unknown, principal: None }
    }

    #[must_use]
    pub fn authenticated(principal: Principal) -> Self {
        Self { status: SessionStatus::Authenticated, principal: Some(principal) }
    }

    #[must_use]
    pub fn unauthenticated() -> Self {
        Self { status: SessionStatus::Unauthenticated, principal: None }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[must_use]
    pub fn principal_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.id.as_str())
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.status != SessionStatus::Unknown
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Next state after `event`. Every event lands in a resolved state.
    #[must_use]
    pub fn apply(self, event: SessionEvent) -> Self {
        match event {
            SessionEvent::Resolved(Some(principal)) | SessionEvent::SignedIn(principal) => {
                Self::authenticated(principal)
            }
            SessionEvent::Resolved(None) | SessionEvent::SignedOut | SessionEvent::Expired => Self::unauthenticated(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
