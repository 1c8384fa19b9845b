//! Profile sync: make sure a signed-in user has a `profiles` row.
//!
//! Called by the auth forms after a successful sign-in or auto-confirmed
//! sign-up. Failures are reported to the caller, which logs them and carries
//! on: a missing profile row never blocks authentication.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::session::Principal;

#[derive(Debug, thiserror::Error)]
pub enum ProfileSyncError {
    #[error("principal id is not a UUID: {0}")]
    InvalidId(String),

    #[error("profile store error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ProfileSyncError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "E_PROFILE_INVALID_ID",
            Self::Database(_) => "E_PROFILE_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[async_trait::async_trait]
pub trait ProfileSync: Send + Sync {
    /// Create a default profile for `principal` if none exists. Existing
    /// rows are left untouched.
    async fn ensure_profile(&self, principal: &Principal, full_name: Option<&str>) -> Result<(), ProfileSyncError>;
}

pub struct PgProfileSync {
    pool: PgPool,
}

impl PgProfileSync {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileSync for PgProfileSync {
    async fn ensure_profile(&self, principal: &Principal, full_name: Option<&str>) -> Result<(), ProfileSyncError> {
        let id = parse_principal_id(&principal.id)?;
        let inserted = sqlx::query(
            "INSERT INTO profiles (id, email, full_name) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(principal.email.as_deref())
        .bind(full_name)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            tracing::info!(%id, "profile created");
        }
        Ok(())
    }
}

/// Identity-service user ids are UUIDs; anything else cannot key a profile.
///
/// # Errors
///
/// Returns [`ProfileSyncError::InvalidId`] when `raw` does not parse.
pub fn parse_principal_id(raw: &str) -> Result<Uuid, ProfileSyncError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ProfileSyncError::InvalidId(raw.to_owned()))
}
