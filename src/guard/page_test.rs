use std::sync::Arc;

use super::*;
use crate::guard::GuardConfig;
use crate::guard::routes::RouteTable;
use crate::loop_breaker::LoopBreaker;
use crate::state::test_helpers::{MockIdentity, auth_session, store_over};

const IDENTITY: &str = "ip:198.51.100.4";

fn guard() -> RedirectGuard {
    RedirectGuard::new(RouteTable::default(), LoopBreaker::default(), GuardConfig::default())
}

#[tokio::test]
async fn resolved_session_decides_without_waiting() {
    let store = store_over(Arc::new(MockIdentity::new().with_session(auth_session("u1", "ada@example.com"))));
    store.refresh_session().await.unwrap();

    let mut page = PageGuard::new(guard(), &store);
    let started = Instant::now();
    let decision = page.await_decision(&Navigation::new("/auth/login", IDENTITY), Duration::from_secs(2)).await;
    assert_eq!(decision, NavigationDecision::RedirectToLanding);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn unresolved_session_allows_after_max_wait() {
    let store = store_over(Arc::new(MockIdentity::new()));
    let g = guard();
    let mut page = PageGuard::new(g.clone(), &store);

    let started = Instant::now();
    let decision = page.await_decision(&Navigation::new("/dashboard", IDENTITY), Duration::from_millis(40)).await;
    assert_eq!(decision, NavigationDecision::Allow);
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert!(g.breaker().is_empty());
}

#[tokio::test]
async fn resolution_during_wait_produces_decision() {
    let store = store_over(Arc::new(MockIdentity::new()));
    let mut page = PageGuard::new(guard(), &store);

    let resolver = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store.refresh_session().await
        })
    };

    let decision = page.await_decision(&Navigation::new("/dashboard", IDENTITY), Duration::from_secs(2)).await;
    assert_eq!(decision, NavigationDecision::RedirectToLogin { callback: "/dashboard".into() });
    resolver.await.unwrap().unwrap();
}

#[tokio::test]
async fn dropping_the_wait_issues_nothing() {
    let store = store_over(Arc::new(MockIdentity::new()));
    let g = guard();
    let mut page = PageGuard::new(g.clone(), &store);

    let nav = Navigation::new("/dashboard", IDENTITY);
    let abandoned = tokio::time::timeout(Duration::from_millis(20), page.await_decision(&nav, Duration::from_secs(5))).await;
    assert!(abandoned.is_err());

    store.refresh_session().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(g.breaker().is_empty());
}
