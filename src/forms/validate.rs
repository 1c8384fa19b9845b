//! Local form validation. Runs before any identity-service call.

use super::{FieldErrors, FormConfig, LoginFields, SignupFields};
use crate::session::store::Credentials;

const FULL_NAME_MAX_CHARS: usize = 100;

/// Trimmed, lowercased address if it looks deliverable: one `@`, a
/// non-empty local part, a dotted domain, no whitespace.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let dotted = domain
        .split('.')
        .collect::<Vec<_>>();
    if dotted.len() < 2 || dotted.iter().any(|label| label.is_empty()) {
        return None;
    }
    Some(normalized)
}

/// A validated sign-up submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// # Errors
///
/// Returns every field problem found, keyed by field name.
pub fn validate_login(fields: &LoginFields, config: &FormConfig) -> Result<Credentials, FieldErrors> {
    let mut errors = FieldErrors::default();
    let email = check_email(&fields.email, &mut errors);
    check_password(&fields.password, config, &mut errors);

    match email {
        Some(email) if errors.is_empty() => Ok(Credentials { email, password: fields.password.clone() }),
        _ => Err(errors),
    }
}

/// # Errors
///
/// Returns every field problem found, keyed by field name.
pub fn validate_signup(fields: &SignupFields, config: &FormConfig) -> Result<SignupRequest, FieldErrors> {
    let mut errors = FieldErrors::default();
    let email = check_email(&fields.email, &mut errors);
    check_password(&fields.password, config, &mut errors);

    if fields.confirm_password != fields.password {
        errors.insert("confirm_password", "Passwords do not match.");
    }

    let full_name = fields
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned);
    if full_name
        .as_ref()
        .is_some_and(|name| name.chars().count() > FULL_NAME_MAX_CHARS)
    {
        errors.insert("full_name", format!("Name must be at most {FULL_NAME_MAX_CHARS} characters."));
    }

    match email {
        Some(email) if errors.is_empty() => Ok(SignupRequest { email, password: fields.password.clone(), full_name }),
        _ => Err(errors),
    }
}

fn check_email(raw: &str, errors: &mut FieldErrors) -> Option<String> {
    if raw.trim().is_empty() {
        errors.insert("email", "Email is required.");
        return None;
    }
    let email = normalize_email(raw);
    if email.is_none() {
        errors.insert("email", "Enter a valid email address.");
    }
    email
}

fn check_password(raw: &str, config: &FormConfig, errors: &mut FieldErrors) {
    if raw.is_empty() {
        errors.insert("password", "Password is required.");
    } else if raw.chars().count() < config.password_min_len {
        errors.insert(
            "password",
            format!("Password must be at least {} characters.", config.password_min_len),
        );
    }
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
