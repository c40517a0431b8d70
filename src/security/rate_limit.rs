//! Sliding-window rate limiting per named resource.
//!
//! # Design Decisions
//! - Each resource keeps a time-ordered queue of admitted events
//! - The sustained cap applies over `window`, the burst cap over `burst_window`
//! - Unregistered names are fail-open
//! - Advisory: a denial is reported to the caller, nothing is queued

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::{WalletError, WalletResult};
use crate::observability::metrics;

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the next admission can succeed. Zero when allowed.
    pub retry_after_secs: f64,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: 0.0,
        }
    }

    fn deny(wait: Duration) -> Self {
        Self {
            allowed: false,
            retry_after_secs: wait.as_secs_f64(),
        }
    }
}

/// Per-resource window state.
#[derive(Debug)]
struct SlidingWindow {
    events: VecDeque<Instant>,
    window: Duration,
    max_events: u32,
    burst: u32,
    burst_window: Duration,
}

impl SlidingWindow {
    fn new(config: &RateLimitConfig) -> Self {
        Self {
            events: VecDeque::new(),
            window: Duration::from_secs(config.window_secs),
            max_events: config.max_events.max(1),
            burst: config.burst.unwrap_or(config.max_events).max(1),
            burst_window: Duration::from_secs(config.burst_window_secs),
        }
    }

    fn try_admit(&mut self, now: Instant) -> RateDecision {
        while let Some(&oldest) = self.events.front() {
            if now.duration_since(oldest) >= self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }

        let mut wait = Duration::ZERO;

        if self.events.len() >= self.max_events as usize {
            if let Some(&oldest) = self.events.front() {
                wait = wait.max(self.window.saturating_sub(now.duration_since(oldest)));
            }
        }

        // Events inside the burst interval, newest last.
        let recent = self
            .events
            .iter()
            .rev()
            .take_while(|&&t| now.duration_since(t) < self.burst_window)
            .count();
        if recent >= self.burst as usize {
            // The event that must age out is the `burst`-th newest.
            if let Some(&t) = self.events.iter().rev().nth(self.burst as usize - 1) {
                wait = wait.max(self.burst_window.saturating_sub(now.duration_since(t)));
            }
        }

        if wait > Duration::ZERO {
            return RateDecision::deny(wait);
        }

        self.events.push_back(now);
        RateDecision::allow()
    }

    fn in_window(&self, now: Instant) -> usize {
        self.events
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }
}

/// Snapshot of one resource's usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateUsage {
    pub resource: String,
    pub used: u32,
    pub max_events: u32,
    pub window_secs: u64,
}

/// Shared rate limiter over named resources.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, SlidingWindow>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a limiter with every configured resource registered.
    pub fn from_config(limits: &[RateLimitConfig]) -> Self {
        let limiter = Self::new();
        for limit in limits {
            limiter.register(limit);
        }
        limiter
    }

    /// Register or replace a resource. Replacing resets its history.
    pub fn register(&self, config: &RateLimitConfig) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.insert(config.name.clone(), SlidingWindow::new(config));
        tracing::debug!(
            resource = %config.name,
            window_secs = config.window_secs,
            max_events = config.max_events,
            "Registered rate limiter"
        );
    }

    /// Check and, if allowed, record one admission for `resource`.
    pub fn check(&self, resource: &str) -> RateDecision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let Some(window) = windows.get_mut(resource) else {
            return RateDecision::allow();
        };

        let decision = window.try_admit(Instant::now());
        if !decision.allowed {
            tracing::warn!(
                resource,
                retry_after_secs = decision.retry_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(resource);
        }
        decision
    }

    /// Like [`check`](Self::check), but a denial becomes `WalletError::RateLimited`.
    pub fn acquire(&self, resource: &str) -> WalletResult<()> {
        let decision = self.check(resource);
        if decision.allowed {
            Ok(())
        } else {
            Err(WalletError::RateLimited {
                resource: resource.to_string(),
                retry_after_secs: decision.retry_after_secs,
            })
        }
    }

    /// Current usage for a registered resource, without recording an event.
    pub fn usage(&self, resource: &str) -> Option<RateUsage> {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.get(resource).map(|w| RateUsage {
            resource: resource.to_string(),
            used: w.in_window(Instant::now()) as u32,
            max_events: w.max_events,
            window_secs: w.window.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window: u64, max: u32, burst: Option<u32>) -> RateLimiter {
        RateLimiter::from_config(&[RateLimitConfig::new("x", window, max, burst)])
    }

    #[tokio::test(start_paused = true)]
    async fn test_allows_max_events_then_denies() {
        let limiter = limiter(60, 3, None);

        for _ in 0..3 {
            assert!(limiter.check("x").allowed);
        }
        let denied = limiter.check("x");
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs > 0.0);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("x").allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = limiter(10, 2, None);

        assert!(limiter.check("x").allowed);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(limiter.check("x").allowed);
        assert!(!limiter.check("x").allowed);

        // First event ages out, second is still inside the window.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(limiter.check("x").allowed);
        let denied = limiter.check("x");
        assert!(!denied.allowed);
        assert!((denied.retry_after_secs - 5.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_cap() {
        let limiter = limiter(3600, 10, Some(2));

        assert!(limiter.check("x").allowed);
        assert!(limiter.check("x").allowed);
        let denied = limiter.check("x");
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs <= 1.0);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.check("x").allowed);
    }

    #[test]
    fn test_unknown_resource_is_fail_open() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.check("nothing").allowed);
        }
        assert!(limiter.usage("nothing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_maps_denial() {
        let limiter = limiter(60, 1, None);
        limiter.acquire("x").unwrap();
        let err = limiter.acquire("x").unwrap_err();
        assert!(matches!(err, WalletError::RateLimited { ref resource, .. } if resource == "x"));
        assert_eq!(limiter.usage("x").unwrap().used, 1);
    }
}
