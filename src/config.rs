//! Gateway configuration parsed from environment variables.
//!
//! `GateConfig::from_lookup` takes the variable source as a closure so the
//! parsing rules are testable without touching the process environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::db::DEFAULT_DB_MAX_CONNECTIONS;
use crate::forms::FormConfig;
use crate::guard::page::DEFAULT_MAX_WAIT_MS;
use crate::guard::routes::RouteTable;
use crate::guard::{DEFAULT_CALLBACK_PARAM, DEFAULT_LANDING_ROUTE, DEFAULT_LOGIN_ROUTE, GuardConfig};
use crate::identity::gotrue::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, GoTrueConfig};
use crate::loop_breaker::{
    DEFAULT_COOLDOWN_MS, DEFAULT_LOOP_MAX_REDIRECTS, DEFAULT_LOOP_WINDOW_SECS, DEFAULT_RETENTION_SECS,
    DEFAULT_SWEEP_THRESHOLD, LoopBreakerConfig,
};
use crate::session::store::{DEFAULT_REFRESH_DEBOUNCE_MS, StoreConfig};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SITE_DIR: &str = "./site";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("route table {path}: {message}")]
    RoutesFile { path: String, message: String },
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub port: u16,
    pub identity: GoTrueConfig,
    /// Profile sync is disabled when absent.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub site_dir: PathBuf,
    pub routes: RouteTable,
    pub guard: GuardConfig,
    pub loop_breaker: LoopBreakerConfig,
    pub store: StoreConfig,
    /// How long a page waits for an unresolved session before deciding.
    pub max_wait: Duration,
    pub forms: FormConfig,
    pub secure_cookies: bool,
}

impl GateConfig {
    /// Build from the process environment.
    ///
    /// Required: `SUPABASE_URL`, `SUPABASE_ANON_KEY`. Everything else has a
    /// default; see the `DEFAULT_*` constants next to each component.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or the route table file cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`GateConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("SUPABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("SUPABASE_URL"))?
            .trim()
            .trim_end_matches('/')
            .to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid { key: "SUPABASE_URL", message: format!("not an http(s) URL: {base_url}") });
        }
        let anon_key = lookup("SUPABASE_ANON_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?;

        let identity = GoTrueConfig {
            base_url: base_url.clone(),
            anon_key,
            request_timeout_secs: parse_or(&lookup, "IDENTITY_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_timeout_secs: parse_or(&lookup, "IDENTITY_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        let routes = match lookup("ROUTES_FILE") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::RoutesFile { path: path.clone(), message: e.to_string() })?;
                RouteTable::from_yaml(&raw).map_err(|e| ConfigError::RoutesFile { path, message: e.to_string() })?
            }
            None => RouteTable::default(),
        };

        let guard = GuardConfig {
            login_route: route_or(&lookup, "LOGIN_ROUTE", DEFAULT_LOGIN_ROUTE)?,
            landing_route: route_or(&lookup, "LANDING_ROUTE", DEFAULT_LANDING_ROUTE)?,
            callback_param: lookup("CALLBACK_PARAM").unwrap_or_else(|| DEFAULT_CALLBACK_PARAM.to_owned()),
        };
        // An authenticated visitor on the login page, wherever it lives, goes to landing.
        let routes = routes.with_auth_only(&guard.login_route);

        let loop_breaker = LoopBreakerConfig {
            cooldown: Duration::from_millis(parse_or(&lookup, "REDIRECT_COOLDOWN_MS", DEFAULT_COOLDOWN_MS)?),
            retention: Duration::from_secs(parse_or(&lookup, "REDIRECT_RETENTION_SECS", DEFAULT_RETENTION_SECS)?),
            sweep_threshold: parse_or(&lookup, "REDIRECT_SWEEP_THRESHOLD", DEFAULT_SWEEP_THRESHOLD)?,
            loop_max_redirects: parse_or(&lookup, "REDIRECT_LOOP_MAX", DEFAULT_LOOP_MAX_REDIRECTS)?,
            loop_window: Duration::from_secs(parse_or(&lookup, "REDIRECT_LOOP_WINDOW_SECS", DEFAULT_LOOP_WINDOW_SECS)?),
        };
        if loop_breaker.loop_max_redirects == 0 {
            return Err(ConfigError::Invalid { key: "REDIRECT_LOOP_MAX", message: "must be at least 1".into() });
        }

        let secure_cookies = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::Invalid { key: "COOKIE_SECURE", message: format!("not a boolean: {raw}") })?,
            None => base_url.starts_with("https://"),
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            identity,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            site_dir: lookup("SITE_DIR").map_or_else(|| PathBuf::from(DEFAULT_SITE_DIR), PathBuf::from),
            routes,
            guard,
            loop_breaker,
            store: StoreConfig {
                refresh_debounce: Duration::from_millis(parse_or(
                    &lookup,
                    "SESSION_REFRESH_DEBOUNCE_MS",
                    DEFAULT_REFRESH_DEBOUNCE_MS,
                )?),
            },
            max_wait: Duration::from_millis(parse_or(&lookup, "SESSION_MAX_WAIT_MS", DEFAULT_MAX_WAIT_MS)?),
            forms: FormConfig {
                password_min_len: parse_or(&lookup, "PASSWORD_MIN_LEN", FormConfig::default().password_min_len)?,
            },
            secure_cookies,
        })
    }
}

/// `1/true/yes/on` and `0/false/no/off`, case-insensitive.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid { key, message: format!("{raw:?}: {e}") }),
    }
}

fn route_or<F>(lookup: &F, key: &'static str, default: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let route = lookup(key).unwrap_or_else(|| default.to_owned());
    if !route.starts_with('/') || route.starts_with("//") {
        return Err(ConfigError::Invalid { key, message: format!("must be a relative path: {route}") });
    }
    Ok(route)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
