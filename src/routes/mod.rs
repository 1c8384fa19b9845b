//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON auth endpoints live under `/api/auth`. Every other path falls back to
//! the static site directory. The navigation middleware wraps the whole
//! router so page requests are guarded before the file service sees them.

pub mod auth;
pub mod middleware;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// API routes used by the portal's forms and client-side guard.
fn api_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/navigate", get(auth::navigate))
        .route("/healthz", get(healthz))
        .layer(cors)
}

/// Full gateway: API routes, guarded static site fallback, request tracing.
pub fn app(state: AppState) -> Router {
    let site = ServeDir::new(&state.config.site_dir).append_index_html_on_directories(true);

    api_routes()
        .fallback_service(site)
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::guard_navigation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
