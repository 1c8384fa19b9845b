use super::*;

fn key(route: &str) -> RedirectKey {
    RedirectKey::new("ip:10.0.0.1", route)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// =============================================================================
// should_suppress / record
// =============================================================================

#[test]
fn fresh_key_is_not_suppressed() {
    let lb = LoopBreaker::default();
    assert!(!lb.should_suppress(&key("/auth/login"), Instant::now()));
}

#[test]
fn recorded_key_is_suppressed_within_cooldown() {
    let lb = LoopBreaker::default();
    let k = key("/auth/login");
    let start = Instant::now();
    lb.record(&k, start);

    assert!(lb.should_suppress(&k, start + ms(1_999)));
    assert!(!lb.should_suppress(&k, start + ms(2_000)));
}

#[test]
fn record_overwrites_latest_timestamp() {
    let lb = LoopBreaker::default();
    let k = key("/dashboard");
    let start = Instant::now();
    lb.record(&k, start);
    lb.record(&k, start + ms(3_000));

    assert_eq!(lb.last_redirect(&k), Some(start + ms(3_000)));
    assert!(lb.should_suppress(&k, start + ms(4_000)));
}

// =============================================================================
// admit
// =============================================================================

#[test]
fn second_redirect_within_cooldown_is_suppressed_and_not_recorded() {
    let lb = LoopBreaker::default();
    let k = key("/auth/login");
    let start = Instant::now();

    assert_eq!(lb.admit(&k, start), Admission::Issue);
    assert_eq!(lb.admit(&k, start + ms(500)), Admission::Suppress { retry_after: ms(1_500) });

    assert_eq!(lb.history_len(&k), 1);
    assert_eq!(lb.last_redirect(&k), Some(start));
}

#[test]
fn redirect_after_cooldown_is_issued() {
    let lb = LoopBreaker::default();
    let k = key("/auth/login");
    let start = Instant::now();

    assert_eq!(lb.admit(&k, start), Admission::Issue);
    assert_eq!(lb.admit(&k, start + ms(2_001)), Admission::Issue);
    assert_eq!(lb.history_len(&k), 2);
}

#[test]
fn distinct_routes_do_not_interfere() {
    let lb = LoopBreaker::default();
    let now = Instant::now();
    assert_eq!(lb.admit(&key("/auth/login"), now), Admission::Issue);
    assert_eq!(lb.admit(&key("/dashboard"), now), Admission::Issue);
}

#[test]
fn distinct_identities_do_not_interfere() {
    let lb = LoopBreaker::default();
    let now = Instant::now();
    assert_eq!(lb.admit(&RedirectKey::new("ip:a", "/auth/login"), now), Admission::Issue);
    assert_eq!(lb.admit(&RedirectKey::new("ip:b", "/auth/login"), now), Admission::Issue);
}

#[test]
fn repeated_redirects_inside_loop_window_are_detected() {
    let lb = LoopBreaker::default();
    let k = key("/auth/login");
    let start = Instant::now();

    assert_eq!(lb.admit(&k, start), Admission::Issue);
    assert_eq!(lb.admit(&k, start + ms(2_500)), Admission::Issue);
    assert_eq!(lb.admit(&k, start + ms(5_000)), Admission::Issue);
    assert_eq!(lb.admit(&k, start + ms(7_500)), Admission::LoopDetected);
    assert_eq!(lb.history_len(&k), 3);
}

#[test]
fn loop_detection_resets_once_window_passes() {
    let lb = LoopBreaker::default();
    let k = key("/auth/login");
    let start = Instant::now();
    for i in 0..3 {
        assert_eq!(lb.admit(&k, start + ms(i * 2_500)), Admission::Issue);
    }
    assert_eq!(lb.admit(&k, start + ms(7_500)), Admission::LoopDetected);

    // Oldest entries age out of the 10s window.
    assert_eq!(lb.admit(&k, start + ms(15_100)), Admission::Issue);
}

#[test]
fn concurrent_admits_issue_exactly_once() {
    let lb = LoopBreaker::default();
    let k = key("/auth/login");
    let now = Instant::now();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let lb = lb.clone();
            let k = k.clone();
            std::thread::spawn(move || lb.admit(&k, now))
        })
        .collect();
    let issued = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|a| *a == Admission::Issue)
        .count();

    assert_eq!(issued, 1);
    assert_eq!(lb.history_len(&k), 1);
}

// =============================================================================
// sweep
// =============================================================================

#[test]
fn sweep_removes_records_older_than_retention() {
    let lb = LoopBreaker::default();
    let start = Instant::now();
    lb.record(&key("/old"), start);
    lb.record(&key("/new"), start + Duration::from_secs(50));

    let removed = lb.sweep(start + Duration::from_secs(61));
    assert_eq!(removed, 1);
    assert_eq!(lb.len(), 1);
    assert!(lb.last_redirect(&key("/new")).is_some());
}

#[test]
fn sweep_runs_opportunistically_past_threshold() {
    let lb = LoopBreaker::new(LoopBreakerConfig { sweep_threshold: 4, ..LoopBreakerConfig::default() });
    let start = Instant::now();
    for i in 0..4 {
        lb.record(&key(&format!("/stale/{i}")), start);
    }
    assert_eq!(lb.len(), 4);

    let later = start + Duration::from_secs(120);
    assert_eq!(lb.admit(&key("/fresh"), later), Admission::Issue);
    assert_eq!(lb.len(), 1);
}

#[test]
fn map_below_threshold_is_not_swept() {
    let lb = LoopBreaker::default();
    let start = Instant::now();
    lb.record(&key("/stale"), start);
    lb.record(&key("/fresh"), start + Duration::from_secs(120));
    assert_eq!(lb.len(), 2);
}

#[test]
fn clones_share_records() {
    let lb = LoopBreaker::default();
    let other = lb.clone();
    let now = Instant::now();
    assert_eq!(lb.admit(&key("/auth/login"), now), Admission::Issue);
    assert!(other.should_suppress(&key("/auth/login"), now));
    assert!(!other.is_empty());
}
