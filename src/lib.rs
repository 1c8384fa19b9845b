//! Session-driven navigation guard for an authenticated web portal.
//!
//! The library holds the state machine (session store, redirect guard, loop
//! breaker, auth forms); the binary wraps it in an axum gateway that guards
//! page requests and serves the auth forms as JSON endpoints.

pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod guard;
pub mod identity;
pub mod loop_breaker;
pub mod profile;
pub mod routes;
pub mod session;
pub mod state;
