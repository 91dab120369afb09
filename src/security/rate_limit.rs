//! Fixed-window rate limiting.
//!
//! Each key gets `max_attempts` admitted attempts per window. The window
//! starts at the first attempt and the counter resets on the first attempt
//! after it ends. Denied attempts do not consume quota.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::client::client_id;
use crate::security::counter_store::{CounterStore, CounterWrite, InMemoryCounterStore, RateRecord};

/// Header carrying the attempts left in the current window.
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    pub admitted: bool,
    pub remaining: u32,
    /// Set on denial: when the current window ends.
    pub reset_at: Option<DateTime<Utc>>,
}

const MIN_RETRY_AFTER: Duration = Duration::from_secs(1);

impl RateDecision {
    fn admit(remaining: u32) -> Self {
        Self {
            admitted: true,
            remaining,
            reset_at: None,
        }
    }

    fn deny(reset_at: DateTime<Utc>) -> Self {
        Self {
            admitted: false,
            remaining: 0,
            reset_at: Some(reset_at),
        }
    }

    /// How long a denied caller should wait before retrying.
    ///
    /// Never below one second for a denial: a request landing exactly on the
    /// reset instant is still over quota.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Duration {
        match self.reset_at {
            Some(reset) => (reset - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .max(MIN_RETRY_AFTER),
            None => Duration::ZERO,
        }
    }
}

/// Rate limiter over a pluggable counter store.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Limiter backed by process-local memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCounterStore::new()))
    }

    /// Record an attempt for `key` and decide whether to admit it.
    pub fn check(&self, key: &str, max_attempts: u32, window: Duration) -> RateDecision {
        self.check_at(key, max_attempts, window, Utc::now())
    }

    /// [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateDecision {
        let mut decision = RateDecision::deny(now);

        self.store.update(key, &mut |current| match current {
            Some(record) if !record.is_expired(now) => {
                if record.count < max_attempts {
                    let count = record.count + 1;
                    decision = RateDecision::admit(max_attempts - count);
                    CounterWrite::Put(RateRecord {
                        count,
                        ..record.clone()
                    })
                } else {
                    decision = RateDecision::deny(record.window_reset_at);
                    CounterWrite::Keep
                }
            }
            _ if max_attempts == 0 => {
                decision = RateDecision::deny(window_end(now, window));
                CounterWrite::Keep
            }
            _ => {
                decision = RateDecision::admit(max_attempts - 1);
                CounterWrite::Put(RateRecord {
                    key: key.to_string(),
                    count: 1,
                    window_reset_at: window_end(now, window),
                })
            }
        });

        decision
    }

    /// Time until the window for `key` ends; zero when none is active.
    pub fn time_remaining(&self, key: &str) -> Duration {
        self.time_remaining_at(key, Utc::now())
    }

    pub fn time_remaining_at(&self, key: &str, now: DateTime<Utc>) -> Duration {
        self.store
            .get(key)
            .and_then(|record| (record.window_reset_at - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Forget the counter for `key`.
    pub fn reset(&self, key: &str) {
        self.store.remove(key);
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.store.purge_expired(now)
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

fn window_end(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Periodically purge expired counters until shutdown.
pub async fn run_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Rate limit sweeper starting");

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.purge_expired(Utc::now());
                let tracked = limiter.tracked_keys();
                if removed > 0 {
                    tracing::debug!(removed, tracked, "Purged expired rate limit records");
                }
                metrics::record_rate_limit_records(tracked);
            }
            _ = shutdown.recv() => {
                tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

/// State for one rate-limited route group.
#[derive(Clone)]
pub struct RateLimitGate {
    pub limiter: Arc<RateLimiter>,
    /// Live quotas; swapped on config reload.
    pub config: Arc<ArcSwap<RateLimitConfig>>,
    /// Quota scope applied to the routes behind this gate.
    pub scope: &'static str,
}

impl RateLimitGate {
    pub fn new(
        limiter: Arc<RateLimiter>,
        config: Arc<ArcSwap<RateLimitConfig>>,
        scope: &'static str,
    ) -> Self {
        Self {
            limiter,
            config,
            scope,
        }
    }
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(gate): State<RateLimitGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = gate.config.load();
    if !config.enabled {
        return next.run(request).await;
    }

    let addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(addr, request.headers(), config.trust_forwarded_headers);
    let key = format!("{}:{}", gate.scope, client);
    let quota = config.quota_for(gate.scope);

    let now = Utc::now();
    let decision = gate
        .limiter
        .check_at(&key, quota.max_attempts, quota.window(), now);

    if !decision.admitted {
        let retry_after = decision.retry_after(now);
        tracing::warn!(
            client = %client,
            scope = gate.scope,
            retry_after_ms = retry_after.as_millis() as u64,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited(gate.scope);
        return ApiError::RateLimited { retry_after }.into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::retry_after_secs;

    const WINDOW: Duration = Duration::from_millis(1000);

    #[test]
    fn test_admits_up_to_max_then_denies() {
        let limiter = RateLimiter::in_memory();
        let start = Utc::now();

        let remaining: Vec<u32> = (0..3)
            .map(|_| {
                let d = limiter.check_at("1.2.3.4", 3, WINDOW, start);
                assert!(d.admitted);
                assert_eq!(d.reset_at, None);
                d.remaining
            })
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let denied = limiter.check_at("1.2.3.4", 3, WINDOW, start + TimeDelta::milliseconds(10));
        assert!(!denied.admitted);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, Some(start + TimeDelta::milliseconds(1000)));
    }

    #[test]
    fn test_denial_does_not_consume_quota() {
        let limiter = RateLimiter::in_memory();
        let start = Utc::now();
        for _ in 0..5 {
            limiter.check_at("k", 2, WINDOW, start);
        }
        // Record stays at the cap and the window is unchanged.
        let record_reset = start + TimeDelta::milliseconds(1000);
        let d = limiter.check_at("k", 2, WINDOW, start);
        assert_eq!(d.reset_at, Some(record_reset));
        assert_eq!(limiter.time_remaining_at("k", start), WINDOW);
    }

    #[test]
    fn test_window_reset_after_expiry() {
        let limiter = RateLimiter::in_memory();
        let start = Utc::now();
        for _ in 0..4 {
            limiter.check_at("k", 3, WINDOW, start);
        }
        assert!(!limiter.check_at("k", 3, WINDOW, start).admitted);

        let later = start + TimeDelta::milliseconds(1001);
        let d = limiter.check_at("k", 3, WINDOW, later);
        assert!(d.admitted);
        assert_eq!(d.remaining, 2);
        assert_eq!(
            limiter.time_remaining_at("k", later),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::in_memory();
        let now = Utc::now();
        assert!(limiter.check_at("a", 1, WINDOW, now).admitted);
        assert!(!limiter.check_at("a", 1, WINDOW, now).admitted);
        assert!(limiter.check_at("b", 1, WINDOW, now).admitted);
    }

    #[test]
    fn test_time_remaining() {
        let limiter = RateLimiter::in_memory();
        let now = Utc::now();
        assert_eq!(limiter.time_remaining_at("none", now), Duration::ZERO);

        limiter.check_at("k", 3, WINDOW, now);
        assert_eq!(
            limiter.time_remaining_at("k", now + TimeDelta::milliseconds(400)),
            Duration::from_millis(600)
        );
        assert_eq!(
            limiter.time_remaining_at("k", now + TimeDelta::milliseconds(5000)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_retry_after() {
        let now = Utc::now();
        let denied = RateDecision::deny(now + TimeDelta::milliseconds(750));
        assert_eq!(denied.retry_after(now), Duration::from_secs(1));
        let far = RateDecision::deny(now + TimeDelta::milliseconds(2500));
        assert_eq!(far.retry_after(now), Duration::from_millis(2500));
        assert_eq!(RateDecision::admit(1).retry_after(now), Duration::ZERO);
    }

    #[test]
    fn test_denial_at_reset_instant_waits_one_second() {
        let limiter = RateLimiter::in_memory();
        let now = Utc::now();
        let window = Duration::from_secs(60);
        assert!(limiter.check_at("k", 1, window, now).admitted);

        let reset = now + TimeDelta::seconds(60);
        let decision = limiter.check_at("k", 1, window, reset);
        assert!(!decision.admitted);
        assert_eq!(decision.retry_after(reset), Duration::from_secs(1));
        assert_eq!(
            retry_after_secs(decision.retry_after(reset + TimeDelta::seconds(5))),
            1
        );
    }

    #[test]
    fn test_zero_quota_denies_without_recording() {
        let limiter = RateLimiter::in_memory();
        let d = limiter.check_at("k", 0, WINDOW, Utc::now());
        assert!(!d.admitted);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_reset_and_purge() {
        let limiter = RateLimiter::in_memory();
        let now = Utc::now();
        limiter.check_at("a", 1, WINDOW, now);
        limiter.check_at("b", 1, WINDOW, now);
        limiter.reset("a");
        assert!(limiter.check_at("a", 1, WINDOW, now).admitted);

        assert_eq!(limiter.purge_expired(now + TimeDelta::seconds(2)), 2);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_quota() {
        let limiter = Arc::new(RateLimiter::in_memory());
        let now = Utc::now();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| limiter.check_at("shared", 100, WINDOW, now).admitted)
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
    }
}
