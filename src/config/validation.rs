//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts, iteration counts, fee bounds)
//! - Detect duplicate rate limiter names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WalletConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use url::Url;

use crate::config::schema::WalletConfig;

/// Minimum PBKDF2 iteration count accepted for legacy entries.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.network.endpoints.is_empty() {
        errors.push(ValidationError::new("network.endpoints", "at least one endpoint is required"));
    }
    for endpoint in &config.network.endpoints {
        match Url::parse(endpoint) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::new(
                "network.endpoints",
                format!("unsupported scheme '{}' in {}", url.scheme(), endpoint),
            )),
            Err(e) => errors.push(ValidationError::new(
                "network.endpoints",
                format!("invalid URL {}: {}", endpoint, e),
            )),
        }
    }
    if !(1..=60).contains(&config.network.request_timeout_secs) {
        errors.push(ValidationError::new("network.request_timeout_secs", "must be between 1 and 60"));
    }
    if config.network.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("network.probe_timeout_secs", "must be positive"));
    }

    if config.vault.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
        errors.push(ValidationError::new(
            "vault.pbkdf2_iterations",
            format!("must be at least {}", MIN_PBKDF2_ITERATIONS),
        ));
    }
    if config.vault.path.is_empty() {
        errors.push(ValidationError::new("vault.path", "must not be empty"));
    }

    if config.signer.expiry_window == 0 {
        errors.push(ValidationError::new("signer.expiry_window", "must be at least 1"));
    }
    if config.signer.min_fee_drops > config.signer.max_fee_drops {
        errors.push(ValidationError::new("signer.min_fee_drops", "must not exceed max_fee_drops"));
    }

    if config.submitter.max_submit_attempts == 0 {
        errors.push(ValidationError::new("submitter.max_submit_attempts", "must be at least 1"));
    }
    if config.submitter.poll_interval_ms == 0 {
        errors.push(ValidationError::new("submitter.poll_interval_ms", "must be positive"));
    }
    if config.submitter.backoff_base_ms > config.submitter.backoff_max_ms {
        errors.push(ValidationError::new("submitter.backoff_base_ms", "must not exceed backoff_max_ms"));
    }

    let mut names = HashSet::new();
    for limit in &config.rate_limits {
        let field = format!("rate_limits.{}", limit.name);
        if !names.insert(limit.name.as_str()) {
            errors.push(ValidationError::new(field.clone(), "duplicate rate limiter name"));
        }
        if limit.window_secs == 0 {
            errors.push(ValidationError::new(field.clone(), "window_secs must be positive"));
        }
        if limit.max_events == 0 {
            errors.push(ValidationError::new(field.clone(), "max_events must be positive"));
        }
        if limit.burst.is_some_and(|b| b == 0 || b > limit.max_events) {
            errors.push(ValidationError::new(field, "burst must be between 1 and max_events"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RateLimitConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&WalletConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = WalletConfig::default();
        config.network.endpoints = vec!["ftp://example.com".into(), "not a url".into()];
        config.network.request_timeout_secs = 0;
        config.vault.pbkdf2_iterations = 1000;
        config.rate_limits = vec![
            RateLimitConfig::new("x", 60, 5, Some(10)),
            RateLimitConfig::new("x", 60, 5, None),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 6, "got {:?}", errors);
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
        assert!(errors.iter().any(|e| e.field == "vault.pbkdf2_iterations"));
    }
}
