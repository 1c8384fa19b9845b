//! Navigation middleware: the Redirect Guard in front of every page.
//!
//! ARCHITECTURE
//! ============
//! Page requests (GET/HEAD outside `/api/` and `/healthz`) are classified
//! against the route table. Public pages pass straight through without a
//! session lookup. Everything else resolves the session with a
//! request-scoped Session Store seeded from the cookies, then runs the same
//! `RedirectGuard::decide` the page guard uses:
//!
//! - redirect decisions become `307 Temporary Redirect`;
//! - `LoopDetected` renders a small in-place page instead of redirecting;
//! - `Allow` (including an unresolved session) passes through.
//!
//! Tokens refreshed during resolution are written back as cookies.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use super::auth::{client_identity, resolve_session};
use crate::guard::routes::RouteClass;
use crate::guard::{Navigation, NavigationDecision};
use crate::state::AppState;

const LOOP_PAGE: &str = "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Redirect loop</title></head>\
<body><h1>We could not finish signing you in</h1>\
<p>This page kept redirecting. Clear your cookies for this site and try again.</p></body></html>\n";

fn is_page_request(req: &Request) -> bool {
    let path = req.uri().path();
    matches!(*req.method(), Method::GET | Method::HEAD) && !path.starts_with("/api/") && path != "/healthz"
}

pub async fn guard_navigation(State(state): State<AppState>, jar: CookieJar, req: Request, next: Next) -> Response {
    if !is_page_request(&req) {
        return next.run(req).await;
    }

    let path_and_query = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_owned(), |pq| pq.as_str().to_owned());
    let identity = client_identity(req.headers(), &jar);
    let nav = Navigation::from_path_and_query(&path_and_query, &state.config.guard.callback_param, identity);

    if state.guard.routes().classify(&nav.path) == RouteClass::Public {
        return next.run(req).await;
    }

    let resolved = resolve_session(&state, &jar).await;
    if let Some(e) = &resolved.error {
        tracing::warn!(path = %nav.path, error = %e, "session unresolved; deferring navigation decision");
    }
    let jar = resolved.sync_cookies(jar, state.config.secure_cookies);

    let decision = state.guard.decide(&nav, &resolved.session, Instant::now());
    match (&decision, state.guard.location(&decision)) {
        (_, Some(location)) => (jar, Redirect::temporary(&location)).into_response(),
        (NavigationDecision::LoopDetected { .. }, None) => {
            (StatusCode::LOOP_DETECTED, jar, Html(LOOP_PAGE)).into_response()
        }
        _ => {
            let response = next.run(req).await;
            (jar, response).into_response()
        }
    }
}

#[cfg(test)]
#[path = "middleware_test.rs"]
mod tests;
