//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single ledger JSON-RPC endpoint
//! - Track health state (Unknown/Healthy/Unhealthy)
//! - Track the last failure for cool-down decisions

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use url::Url;

use crate::observability::metrics;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// A single ledger endpoint.
#[derive(Debug)]
pub struct Endpoint {
    /// JSON-RPC URL.
    pub url: Url,
    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    state: AtomicU8,
    /// Consecutive failure count.
    consecutive_failures: AtomicUsize,
    last_failure: Mutex<Option<Instant>>,
}

impl Endpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            last_failure: Mutex::new(None),
        }
    }

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Time of the most recent failure, if any since the last reset.
    pub fn last_failure(&self) -> Option<Instant> {
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether this endpoint may be tried now.
    ///
    /// Unhealthy endpoints become eligible again once `cooldown` has elapsed
    /// since their last failure.
    pub fn is_available(&self, cooldown: Duration, now: Instant) -> bool {
        if self.health() != HealthState::Unhealthy {
            return true;
        }
        match self.last_failure() {
            Some(at) => now.duration_since(at) >= cooldown,
            None => true,
        }
    }

    /// Report a successful request.
    pub fn mark_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let previous = self.state.swap(HealthState::Healthy as u8, Ordering::Relaxed);
        if previous != HealthState::Healthy as u8 {
            tracing::info!(endpoint = %self.url, "Endpoint marked healthy");
            metrics::record_endpoint_health(self.url.as_str(), true);
        }
    }

    /// Report a failed request (error or timeout).
    pub fn mark_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        let previous = self.state.swap(HealthState::Unhealthy as u8, Ordering::Relaxed);
        if previous != HealthState::Unhealthy as u8 {
            tracing::warn!(endpoint = %self.url, "Endpoint marked unhealthy");
            metrics::record_endpoint_health(self.url.as_str(), false);
        }
    }

    /// Forget all health history.
    pub fn reset(&self) {
        self.state.store(HealthState::Unknown as u8, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new(Url::parse("http://127.0.0.1:5005").unwrap())
    }

    #[test]
    fn test_state_transitions() {
        let ep = endpoint();
        assert_eq!(ep.health(), HealthState::Unknown);

        ep.mark_success();
        assert_eq!(ep.health(), HealthState::Healthy);

        ep.mark_failure();
        ep.mark_failure();
        assert_eq!(ep.health(), HealthState::Unhealthy);
        assert_eq!(ep.consecutive_failures(), 2);

        ep.mark_success();
        assert_eq!(ep.health(), HealthState::Healthy);
        assert_eq!(ep.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown() {
        let ep = endpoint();
        let cooldown = Duration::from_secs(300);

        ep.mark_failure();
        assert!(!ep.is_available(cooldown, Instant::now()));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(ep.is_available(cooldown, Instant::now()));

        ep.reset();
        assert_eq!(ep.health(), HealthState::Unknown);
        assert!(ep.last_failure().is_none());
    }
}
