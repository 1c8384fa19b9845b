//! GoTrue (Supabase Auth) REST client.
//!
//! Thin HTTP wrapper over `/auth/v1`. Pure parsing in `parse_*` for
//! testability; the client itself only sends requests and tracks tokens.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use serde::Deserialize;

use super::{AuthSession, AuthUser, IdentityConnector, IdentityError, IdentityService, SessionTokens, SignUpOutcome};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Access tokens this close to expiry are refreshed instead of used.
const EXPIRY_MARGIN_SECS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoTrueConfig {
    /// Project URL, e.g. `https://abc.supabase.co`. No trailing slash.
    pub base_url: String,
    /// Public anon key, sent as `apikey` on every request.
    pub anon_key: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Shares one HTTP connection pool across every per-context client.
#[derive(Clone)]
pub struct GoTrueConnector {
    http: reqwest::Client,
    config: Arc<GoTrueConfig>,
}

impl GoTrueConnector {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GoTrueConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config: Arc::new(config) })
    }
}

impl IdentityConnector for GoTrueConnector {
    fn connect(&self, tokens: Option<SessionTokens>) -> Arc<dyn IdentityService> {
        Arc::new(GoTrueClient { http: self.http.clone(), config: Arc::clone(&self.config), tokens: Mutex::new(tokens) })
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    config: Arc<GoTrueConfig>,
    tokens: Mutex<Option<SessionTokens>>,
}

impl GoTrueClient {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.base_url)
    }

    fn set_tokens(&self, tokens: Option<SessionTokens>) {
        *self
            .tokens
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = tokens;
    }

    fn take_tokens(&self) -> Option<SessionTokens> {
        self.tokens
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }

    /// Send a request and return `(status, body)` without judging the status.
    async fn send(&self, request: reqwest::RequestBuilder, bearer: Option<&str>) -> Result<(StatusCode, String), IdentityError> {
        let bearer = bearer.unwrap_or(&self.config.anon_key);
        let response = request
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        Ok((status, text))
    }

    async fn post(&self, path: &str, bearer: Option<&str>, body: &serde_json::Value) -> Result<String, IdentityError> {
        let request = self.http.post(self.endpoint(path)).json(body);
        let (status, text) = self.send(request, bearer).await?;
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }
        Ok(text)
    }

    /// `Ok(None)` when the access token is rejected.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<AuthUser>, IdentityError> {
        let request = self.http.get(self.endpoint("user"));
        let (status, text) = self.send(request, Some(access_token)).await?;
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| IdentityError::Parse(e.to_string()))
    }

    /// `Ok(None)` when the refresh token is rejected.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<AuthSession>, IdentityError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        match self.post("token?grant_type=refresh_token", None, &body).await {
            Ok(text) => parse_session(&text, unix_now()).map(Some),
            Err(IdentityError::Api { status: 400 | 401 | 403, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl IdentityService for GoTrueClient {
    async fn get_session(&self) -> Result<Option<AuthSession>, IdentityError> {
        let Some(tokens) = self.tokens() else {
            return Ok(None);
        };

        if !is_expired(&tokens, unix_now()) {
            if let Some(user) = self.fetch_user(&tokens.access_token).await? {
                return Ok(Some(AuthSession { user, tokens }));
            }
        }

        if tokens.refresh_token.is_empty() {
            self.set_tokens(None);
            return Ok(None);
        }
        let refreshed = self.refresh(&tokens.refresh_token).await?;
        self.set_tokens(refreshed.as_ref().map(|s| s.tokens.clone()));
        Ok(refreshed)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let text = self.post("token?grant_type=password", None, &body).await?;
        let session = parse_session(&text, unix_now())?;
        self.set_tokens(Some(session.tokens.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, IdentityError> {
        let body = serde_json::json!({ "email": email, "password": password, "data": metadata });
        let text = self.post("signup", None, &body).await?;
        let outcome = parse_sign_up(&text, unix_now())?;
        if let Some(session) = &outcome.session {
            self.set_tokens(Some(session.tokens.clone()));
        }
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(tokens) = self.take_tokens() else {
            return Ok(());
        };
        let request = self.http.post(self.endpoint("logout"));
        let (status, text) = self.send(request, Some(&tokens.access_token)).await?;
        // An already-invalid token means the session is gone anyway.
        if status.is_success() || matches!(status, StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND) {
            return Ok(());
        }
        Err(parse_error(status.as_u16(), &text))
    }

    fn tokens(&self) -> Option<SessionTokens> {
        self.tokens
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

fn into_session(resp: TokenResponse, now: i64) -> AuthSession {
    let expires_at = resp
        .expires_at
        .or_else(|| resp.expires_in.map(|secs| now + secs));
    AuthSession {
        user: resp.user,
        tokens: SessionTokens { access_token: resp.access_token, refresh_token: resp.refresh_token, expires_at },
    }
}

pub(crate) fn parse_session(json: &str, now: i64) -> Result<AuthSession, IdentityError> {
    let resp: TokenResponse = serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(into_session(resp, now))
}

/// Sign-up answers with a full token response when the account is
/// auto-confirmed, and with the bare user object otherwise.
pub(crate) fn parse_sign_up(json: &str, now: i64) -> Result<SignUpOutcome, IdentityError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))?;
    if value.get("access_token").is_some() {
        let resp: TokenResponse = serde_json::from_value(value).map_err(|e| IdentityError::Parse(e.to_string()))?;
        let session = into_session(resp, now);
        return Ok(SignUpOutcome { user: Some(session.user.clone()), session: Some(session) });
    }
    let user_value = value.get("user").cloned().unwrap_or(value);
    let user = if user_value.get("id").is_some() {
        Some(serde_json::from_value(user_value).map_err(|e| IdentityError::Parse(e.to_string()))?)
    } else {
        None
    };
    Ok(SignUpOutcome { user, session: None })
}

pub(crate) fn parse_error(status: u16, body: &str) -> IdentityError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error_code.or(parsed.error);
    let message = parsed
        .msg
        .or(parsed.error_description)
        .or(parsed.message)
        .unwrap_or_else(|| if body.trim().is_empty() { format!("HTTP {status}") } else { body.trim().to_owned() });
    IdentityError::Api { status, code, message }
}

pub(crate) fn is_expired(tokens: &SessionTokens, now: i64) -> bool {
    tokens
        .expires_at
        .is_some_and(|at| at - EXPIRY_MARGIN_SECS <= now)
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;
