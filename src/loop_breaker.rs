//! In-memory redirect cooldown and loop detection.
//!
//! DESIGN
//! ======
//! Issued-redirect timestamps are kept per `(client identity, route)`
//! key in a `HashMap<RedirectKey, VecDeque<Instant>>`. The newest timestamp
//! drives the cooldown; the timestamps still inside the loop window drive
//! loop detection. One breaker is constructed per process and shared (it is a
//! cheap `Clone` handle) by the HTTP middleware and the auth form handlers, so
//! every call site sees the same cooldown.
//!
//! TRADE-OFFS
//! ==========
//! Stale keys are swept opportunistically when the map grows past a
//! threshold instead of on a timer. Memory is bounded in practice, but an
//! idle process keeps its last few hundred records until the next burst.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN_MS: u64 = 2_000;
pub const DEFAULT_RETENTION_SECS: u64 = 60;
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1_000;
pub const DEFAULT_LOOP_MAX_REDIRECTS: usize = 3;
pub const DEFAULT_LOOP_WINDOW_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopBreakerConfig {
    /// Minimum spacing between two redirects for the same key.
    pub cooldown: Duration,
    /// Records whose newest redirect is older than this are dropped by `sweep`.
    pub retention: Duration,
    /// Map size that triggers an opportunistic sweep.
    pub sweep_threshold: usize,
    /// Issued redirects per key tolerated inside `loop_window`.
    pub loop_max_redirects: usize,
    pub loop_window: Duration,
}

impl Default for LoopBreakerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(DEFAULT_COOLDOWN_MS),
            retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
            loop_max_redirects: DEFAULT_LOOP_MAX_REDIRECTS,
            loop_window: Duration::from_secs(DEFAULT_LOOP_WINDOW_SECS),
        }
    }
}

/// Composite key: who is being redirected, and from which route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedirectKey {
    pub identity: String,
    pub route: String,
}

impl RedirectKey {
    #[must_use]
    pub fn new(identity: impl Into<String>, route: impl Into<String>) -> Self {
        Self { identity: identity.into(), route: route.into() }
    }
}

/// Verdict for a redirect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Redirect may be issued; it has been recorded.
    Issue,
    /// A redirect for this key was issued within the cooldown.
    Suppress { retry_after: Duration },
    /// Too many redirects for this key inside the loop window.
    LoopDetected,
}

// =============================================================================
// LOOP BREAKER
// =============================================================================

#[derive(Clone)]
pub struct LoopBreaker {
    inner: Arc<Mutex<LoopBreakerInner>>,
    config: LoopBreakerConfig,
}

struct LoopBreakerInner {
    /// Issued-redirect timestamps per key, oldest first.
    records: HashMap<RedirectKey, VecDeque<Instant>>,
}

impl LoopBreaker {
    #[must_use]
    pub fn new(config: LoopBreakerConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(LoopBreakerInner { records: HashMap::new() })), config }
    }

    #[must_use]
    pub fn config(&self) -> LoopBreakerConfig {
        self.config
    }

    /// True if a redirect for `key` was issued within the cooldown window.
    #[must_use]
    pub fn should_suppress(&self, key: &RedirectKey, now: Instant) -> bool {
        let inner = self.lock();
        inner
            .records
            .get(key)
            .and_then(VecDeque::back)
            .is_some_and(|&last| now.saturating_duration_since(last) < self.config.cooldown)
    }

    /// Store `now` as the latest redirect for `key`.
    pub fn record(&self, key: &RedirectKey, now: Instant) {
        let mut inner = self.lock();
        let history = inner.records.entry(key.clone()).or_default();
        prune_window(history, now, self.history_window());
        history.push_back(now);
        self.maybe_sweep(&mut inner, now);
    }

    /// Atomic check-then-record.
    ///
    /// The check and the record happen under one lock acquisition, so two
    /// callers racing for the same key can never both receive `Issue` inside
    /// the cooldown.
    pub fn admit(&self, key: &RedirectKey, now: Instant) -> Admission {
        let mut inner = self.lock();
        let cfg = self.config;
        let window = self.history_window();

        let history = inner.records.entry(key.clone()).or_default();
        prune_window(history, now, window);

        if let Some(&last) = history.back() {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < cfg.cooldown {
                return Admission::Suppress { retry_after: cfg.cooldown - elapsed };
            }
        }

        let recent = history
            .iter()
            .filter(|&&t| now.saturating_duration_since(t) <= cfg.loop_window)
            .count();
        if recent >= cfg.loop_max_redirects {
            return Admission::LoopDetected;
        }

        history.push_back(now);
        self.maybe_sweep(&mut inner, now);
        Admission::Issue
    }

    /// Drop records whose newest redirect is older than the retention window.
    /// Returns the number of keys removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut inner = self.lock();
        sweep_records(&mut inner.records, now, self.config.retention)
    }

    /// Timestamp of the latest issued redirect for `key`.
    #[must_use]
    pub fn last_redirect(&self, key: &RedirectKey) -> Option<Instant> {
        self.lock().records.get(key).and_then(VecDeque::back).copied()
    }

    /// Number of issued redirects still remembered for `key`.
    #[must_use]
    pub fn history_len(&self, key: &RedirectKey) -> usize {
        self.lock().records.get(key).map_or(0, VecDeque::len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoopBreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// History must outlive both the cooldown and the loop window.
    fn history_window(&self) -> Duration {
        self.config.loop_window.max(self.config.cooldown)
    }

    fn maybe_sweep(&self, inner: &mut LoopBreakerInner, now: Instant) {
        if inner.records.len() > self.config.sweep_threshold {
            let removed = sweep_records(&mut inner.records, now, self.config.retention);
            tracing::debug!(removed, remaining = inner.records.len(), "redirect records swept");
        }
    }
}

impl Default for LoopBreaker {
    fn default() -> Self {
        Self::new(LoopBreakerConfig::default())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.saturating_duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

fn sweep_records(records: &mut HashMap<RedirectKey, VecDeque<Instant>>, now: Instant, retention: Duration) -> usize {
    let before = records.len();
    records.retain(|_, history| {
        history
            .back()
            .is_some_and(|&last| now.saturating_duration_since(last) <= retention)
    });
    before - records.len()
}

#[cfg(test)]
#[path = "loop_breaker_test.rs"]
mod tests;
