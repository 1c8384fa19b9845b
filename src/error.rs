//! Shared error-reporting contract.
//!
//! Every error that crosses the HTTP boundary carries a grepable code and a
//! retryable flag so clients can decide between "fix the input" and "submit
//! again" without parsing messages.

/// Grepable error code and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Render an error as the JSON body used by the auth API.
#[must_use]
pub fn error_body(err: &(impl ErrorCode + ?Sized)) -> serde_json::Value {
    serde_json::json!({
        "code": err.error_code(),
        "message": err.to_string(),
        "retryable": err.retryable(),
    })
}
