use super::*;

// =============================================================================
// normalize_path
// =============================================================================

#[test]
fn normalize_strips_query_and_fragment() {
    assert_eq!(normalize_path("/auth/login?callbackUrl=/dashboard"), "/auth/login");
    assert_eq!(normalize_path("/blog/post#intro"), "/blog/post");
}

#[test]
fn normalize_strips_trailing_slash() {
    assert_eq!(normalize_path("/dashboard/"), "/dashboard");
    assert_eq!(normalize_path("/"), "/");
    assert_eq!(normalize_path(""), "/");
}

#[test]
fn normalize_adds_leading_slash() {
    assert_eq!(normalize_path("dashboard"), "/dashboard");
}

// =============================================================================
// classify
// =============================================================================

#[test]
fn default_table_classifies_dashboard_as_protected() {
    let table = RouteTable::default();
    assert_eq!(table.classify("/dashboard"), RouteClass::Protected);
    assert_eq!(table.classify("/dashboard/courses/42"), RouteClass::Protected);
}

#[test]
fn default_table_classifies_login_and_signup_as_auth_only() {
    let table = RouteTable::default();
    assert_eq!(table.classify("/auth/login"), RouteClass::AuthOnly);
    assert_eq!(table.classify("/auth/signup?ref=nav"), RouteClass::AuthOnly);
}

#[test]
fn unlisted_paths_are_public() {
    let table = RouteTable::default();
    assert_eq!(table.classify("/"), RouteClass::Public);
    assert_eq!(table.classify("/blog/getting-started"), RouteClass::Public);
    assert_eq!(table.classify("/auth/logout"), RouteClass::Public);
}

#[test]
fn prefix_matches_on_segment_boundary_only() {
    let table = RouteTable::default();
    assert_eq!(table.classify("/dashboards"), RouteClass::Public);
    assert_eq!(table.classify("/profiles-public"), RouteClass::Public);
}

#[test]
fn longest_prefix_wins_across_classes() {
    let table = RouteTable::new(["/app"], ["/app/login"], Vec::<String>::new());
    assert_eq!(table.classify("/app/login"), RouteClass::AuthOnly);
    assert_eq!(table.classify("/app/home"), RouteClass::Protected);
}

#[test]
fn root_prefix_covers_everything() {
    let table = RouteTable::new(["/"], ["/auth/login"], Vec::<String>::new());
    assert_eq!(table.classify("/anything"), RouteClass::Protected);
    assert_eq!(table.classify("/auth/login"), RouteClass::AuthOnly);
}

#[test]
fn with_auth_only_covers_custom_login_route() {
    let table = RouteTable::default().with_auth_only("/signin/");
    assert_eq!(table.classify("/signin"), RouteClass::AuthOnly);
    assert_eq!(table.classify("/auth/login"), RouteClass::AuthOnly);
}

#[test]
fn with_auth_only_leaves_covered_route_alone() {
    assert_eq!(RouteTable::default().with_auth_only("/auth/login"), RouteTable::default());
}

#[test]
fn with_auth_only_carves_route_out_of_protected_prefix() {
    let table = RouteTable::new(["/app"], Vec::<String>::new(), Vec::<String>::new()).with_auth_only("/app/login");
    assert_eq!(table.classify("/app/login"), RouteClass::AuthOnly);
    assert_eq!(table.classify("/app/home"), RouteClass::Protected);
}

// =============================================================================
// terminal
// =============================================================================

#[test]
fn logout_and_callback_are_terminal() {
    let table = RouteTable::default();
    assert!(table.is_terminal("/auth/logout"));
    assert!(table.is_terminal("/auth/callback?code=abc"));
    assert!(!table.is_terminal("/auth/login"));
}

// =============================================================================
// from_yaml
// =============================================================================

#[test]
fn from_yaml_parses_and_normalizes() {
    let yaml = "protected: [/learn/, /account]\nauth_only: [/signin]\nterminal: [/signout]\n";
    let table = RouteTable::from_yaml(yaml).unwrap();
    assert_eq!(table.classify("/learn/rust"), RouteClass::Protected);
    assert_eq!(table.classify("/signin"), RouteClass::AuthOnly);
    assert!(table.is_terminal("/signout"));
}

#[test]
fn from_yaml_missing_sections_default_to_empty() {
    let table = RouteTable::from_yaml("protected: [/admin]\n").unwrap();
    assert_eq!(table.classify("/auth/login"), RouteClass::Public);
    assert!(!table.is_terminal("/auth/logout"));
}

#[test]
fn from_yaml_rejects_wrong_shape() {
    assert!(RouteTable::from_yaml("protected: 12").is_err());
}
