use crate::policy::AdmissionPolicy;
use crate::AdmissionError;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Identity used for every tool call: the limiter is server-wide.
pub const GLOBAL_CLIENT_ID: &str = "default";

/// Sliding-window rate limiter keyed by client identity.
///
/// Each identity keeps the instants of its admitted requests. A check prunes
/// everything at or before `now - window`, rejects once `quota` requests
/// remain, and otherwise records `now`. The per-identity entry lock makes
/// prune-count-append atomic, so concurrent callers cannot overshoot.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    enabled: bool,
    quota: usize,
    window: Duration,
    log: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiting is enforced only when the policy requires authentication.
    pub fn new(policy: &AdmissionPolicy) -> Self {
        Self::with_limits(policy.require_auth, policy.rate_limit, policy.window)
    }

    pub fn with_limits(enabled: bool, quota: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                enabled,
                quota: quota as usize,
                window,
                log: DashMap::new(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    pub fn quota(&self) -> usize {
        self.inner.quota
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Check `identity` against the current time.
    pub fn check(&self, identity: &str) -> Result<(), AdmissionError> {
        self.check_at(identity, Instant::now())
    }

    /// Check `identity` as if the request arrived at `now`.
    pub fn check_at(&self, identity: &str, now: Instant) -> Result<(), AdmissionError> {
        if !self.inner.enabled {
            return Ok(());
        }

        let mut entry = self.inner.log.entry(identity.to_string()).or_default();
        let timestamps = entry.value_mut();

        if let Some(lower_bound) = now.checked_sub(self.inner.window) {
            timestamps.retain(|t| *t > lower_bound);
        }

        if timestamps.len() >= self.inner.quota {
            debug!(
                identity = %identity,
                in_window = timestamps.len(),
                quota = self.inner.quota,
                "Rate limit exceeded"
            );
            return Err(AdmissionError::RateLimited {
                identity: identity.to_string(),
            });
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Number of identities currently holding a request log.
    pub fn tracked_identities(&self) -> usize {
        self.inner.log.len()
    }

    /// Requests recorded for `identity` that are still inside the window at `now`.
    pub fn in_window_at(&self, identity: &str, now: Instant) -> usize {
        let lower_bound = now.checked_sub(self.inner.window);
        self.inner
            .log
            .get(identity)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|t| lower_bound.map_or(true, |bound| **t > bound))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop identities whose entire log has left the window. Returns how many
    /// identities were removed.
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let Some(lower_bound) = now.checked_sub(self.inner.window) else {
            return 0;
        };
        let before = self.inner.log.len();
        self.inner
            .log
            .retain(|_, timestamps| timestamps.iter().any(|t| *t > lower_bound));
        before.saturating_sub(self.inner.log.len())
    }

    /// Run `sweep_idle` once per window until the runtime shuts down.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let limiter = self.clone();
        let period = self.inner.window;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            info!(interval = ?period, "Rate limit sweeper started");
            loop {
                interval.tick().await;
                let removed = limiter.sweep_idle(Instant::now());
                if removed > 0 {
                    debug!(removed, remaining = limiter.tracked_identities(), "Evicted idle clients");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn limiter(quota: u32) -> RateLimiter {
        RateLimiter::with_limits(true, quota, MINUTE)
    }

    #[test]
    fn test_third_call_within_window_rejected() {
        let rl = limiter(2);
        let t0 = Instant::now();

        assert!(rl.check_at(GLOBAL_CLIENT_ID, t0).is_ok());
        assert!(rl.check_at(GLOBAL_CLIENT_ID, t0 + Duration::from_secs(1)).is_ok());

        match rl.check_at(GLOBAL_CLIENT_ID, t0 + Duration::from_secs(2)) {
            Err(AdmissionError::RateLimited { identity }) => assert_eq!(identity, "default"),
            other => panic!("Expected rate limit rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_admitted_again_after_window_elapses() {
        let rl = limiter(2);
        let t0 = Instant::now();

        rl.check_at(GLOBAL_CLIENT_ID, t0).unwrap();
        rl.check_at(GLOBAL_CLIENT_ID, t0 + Duration::from_secs(30)).unwrap();
        assert!(rl.check_at(GLOBAL_CLIENT_ID, t0 + Duration::from_secs(31)).is_err());

        // At t0+61s the first call has expired; the one at t0+30s has not.
        let later = t0 + Duration::from_secs(61);
        assert!(rl.check_at(GLOBAL_CLIENT_ID, later).is_ok());
        assert_eq!(rl.in_window_at(GLOBAL_CLIENT_ID, later), 2);
        assert!(rl.check_at(GLOBAL_CLIENT_ID, later).is_err());
    }

    #[test]
    fn test_timestamp_exactly_at_bound_is_expired() {
        let rl = limiter(1);
        let t0 = Instant::now();

        rl.check_at("a", t0).unwrap();
        assert!(rl.check_at("a", t0 + MINUTE - Duration::from_millis(1)).is_err());
        assert!(rl.check_at("a", t0 + MINUTE).is_ok());
    }

    #[test]
    fn test_rejections_do_not_mutate_log() {
        let rl = limiter(2);
        let t0 = Instant::now();

        rl.check_at("a", t0).unwrap();
        rl.check_at("a", t0).unwrap();
        for i in 1..=10 {
            assert!(rl.check_at("a", t0 + Duration::from_secs(i)).is_err());
        }
        assert_eq!(rl.in_window_at("a", t0 + Duration::from_secs(10)), 2);

        // Rejected attempts did not extend the window.
        assert!(rl.check_at("a", t0 + MINUTE).is_ok());
    }

    #[test]
    fn test_disabled_limiter_keeps_no_state() {
        let rl = RateLimiter::new(&AdmissionPolicy::new(false, "", 1));
        assert!(!rl.is_enabled());
        for _ in 0..100 {
            assert!(rl.check(GLOBAL_CLIENT_ID).is_ok());
        }
        assert_eq!(rl.tracked_identities(), 0);
    }

    #[test]
    fn test_identities_are_independent() {
        let rl = limiter(1);
        let t0 = Instant::now();

        assert!(rl.check_at("alice", t0).is_ok());
        assert!(rl.check_at("bob", t0).is_ok());
        assert!(rl.check_at("alice", t0).is_err());
        assert_eq!(rl.tracked_identities(), 2);
    }

    #[test]
    fn test_zero_quota_rejects_everything() {
        let rl = limiter(0);
        assert!(rl.check_at("a", Instant::now()).is_err());
    }

    #[test]
    fn test_sweep_removes_only_idle_identities() {
        let rl = limiter(5);
        let t0 = Instant::now();

        rl.check_at("idle", t0).unwrap();
        rl.check_at("active", t0).unwrap();
        rl.check_at("active", t0 + Duration::from_secs(50)).unwrap();

        assert_eq!(rl.sweep_idle(t0 + Duration::from_secs(30)), 0);
        assert_eq!(rl.sweep_idle(t0 + Duration::from_secs(61)), 1);
        assert_eq!(rl.tracked_identities(), 1);
        assert_eq!(rl.in_window_at("active", t0 + Duration::from_secs(61)), 1);
        assert_eq!(rl.in_window_at("idle", t0 + Duration::from_secs(61)), 0);
    }

    #[test]
    fn test_concurrent_checks_never_overshoot() {
        let rl = limiter(100);
        let admitted = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        if rl.check(GLOBAL_CLIENT_ID).is_ok() {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(std::sync::atomic::Ordering::Relaxed), 100);
    }

    #[tokio::test]
    async fn test_sweeper_task_can_be_aborted() {
        let rl = limiter(1);
        let handle = rl.spawn_sweeper();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
