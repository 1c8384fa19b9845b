//! Identity service: provider-neutral seam over the hosted auth backend.
//!
//! DESIGN
//! ======
//! `IdentityService` mirrors the surface of the hosted SDK: a client object
//! that holds the current tokens and exposes session lookup, password
//! sign-in, sign-up and sign-out. `IdentityConnector` builds one client per
//! context (a browser tab, or one HTTP request seeded with cookie tokens).
//! The GoTrue REST client lives in [`gotrue`]; tests substitute mocks.
//!
//! Errors from the backend are classified into [`AuthError`], the taxonomy
//! shown to users.

pub mod gotrue;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::session::Principal;

// =============================================================================
// TYPES
// =============================================================================

/// Bearer + refresh token pair issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: Option<i64>,
}

/// User record as returned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

impl AuthUser {
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal { id: self.id.clone(), email: self.email.clone() }
    }
}

/// A live session: user plus tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: AuthUser,
    pub tokens: SessionTokens,
}

/// Result of a sign-up. `session` is present only when the backend
/// auto-confirmed the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: Option<AuthUser>,
    pub session: Option<AuthSession>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Transport-level errors produced by identity clients.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The HTTP request never produced a response.
    #[error("identity request failed: {0}")]
    Request(String),

    /// The identity service answered with a non-success status.
    #[error("identity service error: status {status}: {message}")]
    Api { status: u16, code: Option<String>, message: String },

    /// The response body could not be deserialized.
    #[error("identity response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// User-facing classification of sign-in / sign-up failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Your email address has not been confirmed yet.")]
    EmailUnconfirmed,

    #[error("Could not reach the sign-in service. Please try again.")]
    Network(String),

    #[error("A sign-in is already in progress.")]
    InProgress,

    #[error("Something went wrong. Please try again.")]
    Unknown(String),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::EmailUnconfirmed => "E_EMAIL_UNCONFIRMED",
            Self::Network(_) => "E_NETWORK",
            Self::InProgress => "E_IN_PROGRESS",
            Self::Unknown(_) => "E_UNKNOWN",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::InProgress | Self::Unknown(_))
    }
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Request(detail) => Self::Network(detail),
            IdentityError::Api { status, code, message } => classify_api_error(status, code.as_deref(), &message),
            IdentityError::Parse(detail) | IdentityError::HttpClientBuild(detail) => Self::Unknown(detail),
        }
    }
}

fn classify_api_error(status: u16, code: Option<&str>, message: &str) -> AuthError {
    let lowered = message.to_ascii_lowercase();
    match code {
        Some("email_not_confirmed") => return AuthError::EmailUnconfirmed,
        Some("invalid_credentials" | "invalid_grant") => return AuthError::InvalidCredentials,
        _ => {}
    }
    if lowered.contains("email not confirmed") {
        AuthError::EmailUnconfirmed
    } else if lowered.contains("invalid login credentials") {
        AuthError::InvalidCredentials
    } else if status == 429 || status >= 500 {
        AuthError::Network(format!("status {status}: {message}"))
    } else {
        AuthError::Unknown(format!("status {status}: {message}"))
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// SDK-shaped client for the hosted identity service.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Current session, if the held tokens are (still) valid. Refreshes
    /// expired access tokens when a refresh token is available.
    async fn get_session(&self) -> Result<Option<AuthSession>, IdentityError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, IdentityError>;

    /// Revoke the held session. Local tokens are dropped even on error.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Tokens currently held by this client.
    fn tokens(&self) -> Option<SessionTokens>;
}

/// Builds identity clients seeded with a context's tokens.
pub trait IdentityConnector: Send + Sync {
    fn connect(&self, tokens: Option<SessionTokens>) -> Arc<dyn IdentityService>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
