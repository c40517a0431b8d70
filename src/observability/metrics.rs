//! Metrics collection.
//!
//! # Metrics
//! - `wallet_endpoint_health` (gauge): 1=healthy, 0=unhealthy, per endpoint
//! - `wallet_rpc_requests_total` (counter): by method and outcome
//! - `wallet_rate_limited_total` (counter): denied admissions by resource
//! - `wallet_submissions_total` (counter): terminal submission outcomes
//! - `wallet_vault_auth_failures_total` (counter): by kind (password, integrity)
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the host application installs a recorder
//! - Recording can be switched off globally from config

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Enable or disable metric recording.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn record_endpoint_health(endpoint: &str, healthy: bool) {
    if enabled() {
        metrics::gauge!("wallet_endpoint_health", "endpoint" => endpoint.to_string())
            .set(if healthy { 1.0 } else { 0.0 });
    }
}

pub fn record_rpc_request(method: &str, outcome: &'static str) {
    if enabled() {
        metrics::counter!("wallet_rpc_requests_total", "method" => method.to_string(), "outcome" => outcome)
            .increment(1);
    }
}

pub fn record_rate_limited(resource: &str) {
    if enabled() {
        metrics::counter!("wallet_rate_limited_total", "resource" => resource.to_string()).increment(1);
    }
}

pub fn record_submission(outcome: &'static str) {
    if enabled() {
        metrics::counter!("wallet_submissions_total", "outcome" => outcome).increment(1);
    }
}

pub fn record_auth_failure(kind: &'static str) {
    if enabled() {
        metrics::counter!("wallet_vault_auth_failures_total", "kind" => kind).increment(1);
    }
}
