//! Auth routes: JSON endpoints over the auth forms, plus the session-cookie
//! and client-identity helpers shared with the navigation middleware.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::Duration;

use crate::error::error_body;
use crate::forms::{FormResult, LoginFields, SignupFields};
use crate::guard::{Navigation, NavigationDecision};
use crate::identity::{AuthError, SessionTokens};
use crate::session::{Session, SessionStatus, SessionStore};
use crate::state::AppState;

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

/// Lifetime of the refresh cookie; the access cookie follows the token expiry.
const REFRESH_COOKIE_DAYS: i64 = 30;
const ACCESS_COOKIE_FALLBACK_SECS: i64 = 3_600;

// =============================================================================
// COOKIES
// =============================================================================

/// Tokens carried by the request's session cookies. The access token is
/// required; a missing refresh cookie yields an empty refresh token.
#[must_use]
pub fn tokens_from_jar(jar: &CookieJar) -> Option<SessionTokens> {
    let access = jar
        .get(ACCESS_COOKIE)
        .map(Cookie::value)
        .filter(|v| !v.is_empty())?;
    let refresh = jar.get(REFRESH_COOKIE).map(Cookie::value).unwrap_or_default();
    Some(SessionTokens { access_token: access.to_owned(), refresh_token: refresh.to_owned(), expires_at: None })
}

fn session_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

#[must_use]
pub fn set_session_cookies(jar: CookieJar, tokens: &SessionTokens, secure: bool) -> CookieJar {
    let access_ttl = tokens
        .expires_at
        .map(|at| at - crate::identity::gotrue::unix_now())
        .filter(|secs| *secs > 0)
        .unwrap_or(ACCESS_COOKIE_FALLBACK_SECS);
    jar.add(session_cookie(ACCESS_COOKIE, tokens.access_token.clone(), Duration::seconds(access_ttl), secure))
        .add(session_cookie(
            REFRESH_COOKIE,
            tokens.refresh_token.clone(),
            Duration::days(REFRESH_COOKIE_DAYS),
            secure,
        ))
}

#[must_use]
pub fn clear_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, String::new(), Duration::ZERO, secure))
        .add(session_cookie(REFRESH_COOKIE, String::new(), Duration::ZERO, secure))
}

/// Bring the cookies in line with what the request-scoped store ended up
/// with: new tokens are written, rejected ones are cleared.
#[must_use]
pub fn sync_session_cookies(
    jar: CookieJar,
    before: Option<&SessionTokens>,
    store: &SessionStore,
    secure: bool,
) -> CookieJar {
    match store.get_session().status() {
        SessionStatus::Authenticated => match store.tokens() {
            Some(after) if before.is_none_or(|b| b.access_token != after.access_token) => {
                set_session_cookies(jar, &after, secure)
            }
            _ => jar,
        },
        SessionStatus::Unauthenticated if before.is_some() => clear_session_cookies(jar, secure),
        _ => jar,
    }
}

// =============================================================================
// CLIENT IDENTITY
// =============================================================================

/// Key under which redirects for this client are tracked: a digest of the
/// access token when there is one, else the forwarded client address.
#[must_use]
pub fn client_identity(headers: &HeaderMap, jar: &CookieJar) -> String {
    if let Some(token) = jar.get(ACCESS_COOKIE).map(Cookie::value).filter(|v| !v.is_empty()) {
        let digest = Sha256::digest(token.as_bytes());
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        return format!("tok:{hex}");
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map_or_else(|| "anonymous".to_owned(), |ip| format!("ip:{ip}"))
}

// =============================================================================
// SESSION RESOLUTION
// =============================================================================

/// Session for a request. No access cookie means unauthenticated without a
/// network call; otherwise the identity service decides.
pub struct ResolvedSession {
    pub session: Session,
    pub tokens: Option<SessionTokens>,
    pub store: Option<Arc<SessionStore>>,
    pub error: Option<AuthError>,
}

pub async fn resolve_session(state: &AppState, jar: &CookieJar) -> ResolvedSession {
    let Some(tokens) = tokens_from_jar(jar) else {
        return ResolvedSession { session: Session::unauthenticated(), tokens: None, store: None, error: None };
    };
    let store = state.session_store(Some(tokens.clone()));
    let error = store.refresh_session().await.err();
    ResolvedSession { session: store.get_session(), tokens: Some(tokens), store: Some(store), error }
}

impl ResolvedSession {
    #[must_use]
    pub fn sync_cookies(&self, jar: CookieJar, secure: bool) -> CookieJar {
        match &self.store {
            Some(store) => sync_session_cookies(jar, self.tokens.as_ref(), store, secure),
            None => jar,
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

fn form_status(result: &FormResult) -> StatusCode {
    match result {
        FormResult::Redirect { .. }
        | FormResult::SignedIn
        | FormResult::ConfirmationRequired { .. }
        | FormResult::LoopDetected => StatusCode::OK,
        FormResult::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FormResult::Failed { code, .. } => match *code {
            "E_INVALID_CREDENTIALS" | "E_EMAIL_UNCONFIRMED" => StatusCode::UNAUTHORIZED,
            "E_NETWORK" => StatusCode::SERVICE_UNAVAILABLE,
            "E_IN_PROGRESS" => StatusCode::CONFLICT,
            _ => StatusCode::BAD_GATEWAY,
        },
    }
}

fn form_response(state: &AppState, jar: CookieJar, store: &SessionStore, result: FormResult) -> Response {
    let jar = sync_session_cookies(jar, None, store, state.config.secure_cookies);
    (form_status(&result), jar, Json(result)).into_response()
}

/// `POST /api/auth/login`: submit the login form.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(fields): Json<LoginFields>,
) -> Response {
    let identity = client_identity(&headers, &jar);
    let store = state.session_store(None);
    let result = state
        .auth_forms(store.clone(), &identity)
        .submit_login(&fields)
        .await;
    form_response(&state, jar, &store, result)
}

/// `POST /api/auth/signup`: submit the signup form.
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(fields): Json<SignupFields>,
) -> Response {
    let identity = client_identity(&headers, &jar);
    let store = state.session_store(None);
    let result = state
        .auth_forms(store.clone(), &identity)
        .submit_signup(&fields)
        .await;
    form_response(&state, jar, &store, result)
}

/// `POST /api/auth/logout`: revoke the session and clear the cookies.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(tokens) = tokens_from_jar(&jar) {
        state.session_store(Some(tokens)).sign_out().await;
    }
    (clear_session_cookies(jar, state.config.secure_cookies), StatusCode::NO_CONTENT)
}

/// `GET /api/auth/session`: current session as seen by the identity service.
pub async fn session(State(state): State<AppState>, jar: CookieJar) -> Response {
    let resolved = resolve_session(&state, &jar).await;
    let jar = resolved.sync_cookies(jar, state.config.secure_cookies);
    match &resolved.error {
        Some(e) => (StatusCode::SERVICE_UNAVAILABLE, jar, Json(error_body(e))).into_response(),
        None => (jar, Json(resolved.session)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct NavigateQuery {
    /// Target as `path?query`, exactly as the client router sees it.
    pub path: String,
}

#[derive(Debug, Serialize)]
struct NavigateResponse {
    #[serde(flatten)]
    decision: NavigationDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

/// `GET /api/auth/navigate?path=...`: page-guard decision for a client-side
/// navigation. Waits up to `SESSION_MAX_WAIT_MS` for the session to resolve;
/// an unresolved session defers (`allow`).
pub async fn navigate(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<NavigateQuery>,
) -> Response {
    let identity = client_identity(&headers, &jar);
    let nav = Navigation::from_path_and_query(&query.path, &state.config.guard.callback_param, identity);
    let tokens = tokens_from_jar(&jar);
    let store = state.session_store(tokens.clone());
    let mut page = state.page_guard(&store);

    let (decision, refreshed) = tokio::join!(page.await_decision(&nav, state.config.max_wait), store.refresh_session());
    if let Err(e) = refreshed {
        tracing::warn!(path = %nav.path, error = %e, "session unresolved for client navigation");
    }

    let jar = sync_session_cookies(jar, tokens.as_ref(), &store, state.config.secure_cookies);
    let location = state.guard.location(&decision);
    (jar, Json(NavigateResponse { decision, location })).into_response()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
