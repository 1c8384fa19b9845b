use super::*;

fn login(email: &str, password: &str) -> LoginFields {
    LoginFields { email: email.into(), password: password.into(), callback: None }
}

fn signup(email: &str, password: &str, confirm: &str) -> SignupFields {
    SignupFields { email: email.into(), password: password.into(), confirm_password: confirm.into(), full_name: None }
}

// =============================================================================
// normalize_email
// =============================================================================

#[test]
fn normalize_email_trims_and_lowercases() {
    assert_eq!(normalize_email("  Ada@Example.COM "), Some("ada@example.com".into()));
}

#[test]
fn normalize_email_rejects_malformed() {
    for raw in ["", "ada", "@example.com", "ada@", "ada@example", "ada@@example.com", "a da@example.com", "ada@example..com"] {
        assert_eq!(normalize_email(raw), None, "raw: {raw:?}");
    }
}

// =============================================================================
// validate_login
// =============================================================================

#[test]
fn valid_login_yields_normalized_credentials() {
    let creds = validate_login(&login(" Ada@Example.com", "secret1"), &FormConfig::default()).unwrap();
    assert_eq!(creds.email, "ada@example.com");
    assert_eq!(creds.password, "secret1");
}

#[test]
fn login_reports_every_bad_field() {
    let errors = validate_login(&login("nope", "123"), &FormConfig::default()).unwrap_err();
    assert_eq!(errors.get("email"), Some("Enter a valid email address."));
    assert_eq!(errors.get("password"), Some("Password must be at least 6 characters."));
    assert_eq!(errors.len(), 2);
}

#[test]
fn login_requires_fields() {
    let errors = validate_login(&login("  ", ""), &FormConfig::default()).unwrap_err();
    assert_eq!(errors.get("email"), Some("Email is required."));
    assert_eq!(errors.get("password"), Some("Password is required."));
}

#[test]
fn password_length_counts_characters_not_bytes() {
    let cfg = FormConfig { password_min_len: 4 };
    assert!(validate_login(&login("a@b.io", "ééé"), &cfg).is_err());
    assert!(validate_login(&login("a@b.io", "éééé"), &cfg).is_ok());
}

// =============================================================================
// validate_signup
// =============================================================================

#[test]
fn signup_requires_matching_confirmation() {
    let errors = validate_signup(&signup("a@b.io", "secret1", "secret2"), &FormConfig::default()).unwrap_err();
    assert_eq!(errors.get("confirm_password"), Some("Passwords do not match."));
    assert!(errors.get("email").is_none());
}

#[test]
fn signup_trims_full_name_and_drops_blank() {
    let mut fields = signup("a@b.io", "secret1", "secret1");
    fields.full_name = Some("  Ada Lovelace ".into());
    let req = validate_signup(&fields, &FormConfig::default()).unwrap();
    assert_eq!(req.full_name.as_deref(), Some("Ada Lovelace"));

    fields.full_name = Some("   ".into());
    let req = validate_signup(&fields, &FormConfig::default()).unwrap();
    assert!(req.full_name.is_none());
}

#[test]
fn signup_rejects_overlong_name() {
    let mut fields = signup("a@b.io", "secret1", "secret1");
    fields.full_name = Some("x".repeat(101));
    let errors = validate_signup(&fields, &FormConfig::default()).unwrap_err();
    assert!(errors.get("full_name").is_some());
}
