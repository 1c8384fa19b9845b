use super::*;

fn alice() -> Principal {
    Principal { id: "user-1".into(), email: Some("alice@example.com".into()) }
}

fn assert_invariant(session: &Session) {
    assert_eq!(
        session.principal_id().is_some(),
        session.status() == SessionStatus::Authenticated,
        "principal must be present iff authenticated: {session:?}"
    );
}

#[test]
fn default_is_unknown_without_principal() {
    let s = Session::default();
    assert_eq!(s.status(), SessionStatus::Unknown);
    assert!(!s.is_resolved());
    assert_invariant(&s);
}

#[test]
fn resolved_with_principal_authenticates() {
    let s = Session::unknown().apply(SessionEvent::Resolved(Some(alice())));
    assert!(s.is_authenticated());
    assert_eq!(s.principal_id(), Some("user-1"));
}

#[test]
fn resolved_without_principal_is_unauthenticated() {
    let s = Session::unknown().apply(SessionEvent::Resolved(None));
    assert_eq!(s.status(), SessionStatus::Unauthenticated);
    assert!(s.is_resolved());
}

#[test]
fn sign_out_and_expiry_clear_principal() {
    let signed_in = Session::unknown().apply(SessionEvent::SignedIn(alice()));
    assert_eq!(signed_in.clone().apply(SessionEvent::SignedOut), Session::unauthenticated());
    assert_eq!(signed_in.apply(SessionEvent::Expired), Session::unauthenticated());
}

#[test]
fn no_event_returns_to_unknown() {
    let events = [
        SessionEvent::Resolved(None),
        SessionEvent::Resolved(Some(alice())),
        SessionEvent::SignedIn(alice()),
        SessionEvent::SignedOut,
        SessionEvent::Expired,
    ];
    for event in events {
        let from_auth = Session::authenticated(alice()).apply(event.clone());
        let from_anon = Session::unauthenticated().apply(event);
        assert!(from_auth.is_resolved());
        assert!(from_anon.is_resolved());
    }
}

#[test]
fn invariant_holds_across_event_sequences() {
    let script = [
        SessionEvent::SignedIn(alice()),
        SessionEvent::SignedOut,
        SessionEvent::SignedOut,
        SessionEvent::Resolved(Some(alice())),
        SessionEvent::Expired,
        SessionEvent::SignedIn(alice()),
        SessionEvent::Resolved(None),
    ];
    let mut session = Session::unknown();
    assert_invariant(&session);
    for event in script {
        session = session.apply(event);
        assert_invariant(&session);
    }
}

#[test]
fn session_serializes_status_and_principal() {
    let json = serde_json::to_value(Session::authenticated(alice())).unwrap();
    assert_eq!(json["status"], "authenticated");
    assert_eq!(json["principal"]["id"], "user-1");

    let json = serde_json::to_value(Session::unauthenticated()).unwrap();
    assert_eq!(json["status"], "unauthenticated");
    assert!(json["principal"].is_null());
}
