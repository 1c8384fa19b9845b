//! Route classification table.
//!
//! Maps path prefixes to `Protected` / `AuthOnly` / `Public`. The table is
//! configuration data: the built-in defaults cover the portal's dashboard and
//! auth pages, and a YAML file can replace them at startup.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Requires an authenticated session.
    Protected,
    /// Only meaningful for anonymous visitors (login, signup).
    AuthOnly,
    Public,
}

/// Prefix rules. Longest matching prefix wins; prefixes match on path-segment
/// boundaries, so `/dashboard` covers `/dashboard/courses` but not
/// `/dashboards`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteTable {
    #[serde(default)]
    protected: Vec<String>,
    #[serde(default)]
    auth_only: Vec<String>,
    /// Auth actions that must never bounce an authenticated user away
    /// (logout, OAuth/email callbacks).
    #[serde(default)]
    terminal: Vec<String>,
}

impl RouteTable {
    #[must_use]
    pub fn new<P, A, T>(protected: P, auth_only: A, terminal: T) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            protected: protected.into_iter().map(|p| normalize_path(&p.into())).collect(),
            auth_only: auth_only.into_iter().map(|p| normalize_path(&p.into())).collect(),
            terminal: terminal.into_iter().map(|p| normalize_path(&p.into())).collect(),
        }
    }

    /// Parse a table from YAML:
    ///
    /// ```yaml
    /// protected: [/dashboard, /profile]
    /// auth_only: [/auth/login, /auth/signup]
    /// terminal: [/auth/logout]
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the YAML error if the document does not match the shape above.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        let parsed: Self = serde_yaml::from_str(raw)?;
        Ok(Self::new(parsed.protected, parsed.auth_only, parsed.terminal))
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize_path(path);
        let protected = longest_match(&self.protected, &path);
        let auth_only = longest_match(&self.auth_only, &path);
        match (protected, auth_only) {
            (Some(p), Some(a)) if a > p => RouteClass::AuthOnly,
            (Some(_), _) => RouteClass::Protected,
            (None, Some(_)) => RouteClass::AuthOnly,
            (None, None) => RouteClass::Public,
        }
    }

    /// Make sure `route` classifies as `AuthOnly`. Used for a configured
    /// login route that the table does not already cover.
    #[must_use]
    pub fn with_auth_only(mut self, route: &str) -> Self {
        let route = normalize_path(route);
        if self.classify(&route) != RouteClass::AuthOnly {
            self.auth_only.push(route);
        }
        self
    }

    #[must_use]
    pub fn is_terminal(&self, path: &str) -> bool {
        let path = normalize_path(path);
        longest_match(&self.terminal, &path).is_some()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(
            ["/dashboard", "/profile", "/settings", "/tutorials/progress"],
            ["/auth/login", "/auth/signup"],
            ["/auth/logout", "/auth/callback"],
        )
    }
}

/// Strip query, fragment and trailing slashes; an empty path becomes `/`.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let trimmed = raw[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn longest_match(prefixes: &[String], path: &str) -> Option<usize> {
    prefixes
        .iter()
        .filter(|prefix| matches_prefix(path, prefix))
        .map(String::len)
        .max()
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
