//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet core.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the wallet core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Ledger endpoints and timeouts.
    pub network: NetworkConfig,

    /// Vault location and encryption parameters.
    pub vault: VaultConfig,

    /// Transaction building parameters.
    pub signer: SignerConfig,

    /// Submission retry and polling parameters.
    pub submitter: SubmitterConfig,

    /// Named rate limiters.
    pub rate_limits: Vec<RateLimitConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ledger endpoint pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint URLs in priority order.
    pub endpoints: Vec<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Seconds before an unhealthy endpoint may be retried.
    pub cooldown_secs: u64,

    /// Timeout for the best-effort account probe in `add_account`.
    pub probe_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://testnet.xrpl-labs.com".to_string(),
                "https://s.altnet.rippletest.net:51234".to_string(),
            ],
            request_timeout_secs: 20,
            cooldown_secs: 300,
            probe_timeout_secs: 10,
        }
    }
}

/// Encryption scheme used for newly written vault entries.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VaultScheme {
    /// Password-derived PBKDF2 key with AES-GCM.
    Legacy,
    /// App-level key with a versioned token.
    #[default]
    Modern,
}

/// Vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Directory holding the vault store.
    pub path: String,

    /// Scheme for new entries.
    pub scheme: VaultScheme,

    /// PBKDF2 iteration count for legacy entries.
    pub pbkdf2_iterations: u32,

    /// Minimum accepted password length.
    pub min_password_len: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: "wallet_data".to_string(),
            scheme: VaultScheme::Modern,
            pbkdf2_iterations: 100_000,
            min_password_len: 8,
        }
    }
}

/// Transaction builder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Ledgers added to the validated index to form `LastLedgerSequence`.
    pub expiry_window: u32,

    /// Fee floor in drops.
    pub min_fee_drops: u64,

    /// Fee ceiling in drops (protection against fee spikes).
    pub max_fee_drops: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            expiry_window: 8,
            min_fee_drops: 10,
            max_fee_drops: 2_000_000,
        }
    }
}

/// Submission configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmitterConfig {
    /// Total submission attempts on network failure.
    pub max_submit_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub backoff_max_ms: u64,

    /// Interval between status polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Consecutive network failures tolerated while polling.
    pub max_poll_failures: u32,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            max_submit_attempts: 5,
            backoff_base_ms: 1000,
            backoff_max_ms: 8000,
            poll_interval_ms: 1000,
            max_poll_failures: 5,
        }
    }
}

/// A named rate limiter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RateLimitConfig {
    /// Resource name passed to `RateLimiter::check`.
    pub name: String,

    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// Maximum admissions per window.
    pub max_events: u32,

    /// Maximum admissions per burst interval (defaults to `max_events`).
    #[serde(default)]
    pub burst: Option<u32>,

    /// Burst interval in seconds.
    #[serde(default = "default_burst_window")]
    pub burst_window_secs: u64,
}

fn default_burst_window() -> u64 {
    1
}

impl RateLimitConfig {
    pub fn new(name: &str, window_secs: u64, max_events: u32, burst: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            window_secs,
            max_events,
            burst,
            burst_window_secs: default_burst_window(),
        }
    }
}

/// Rate limiters registered when the config file names none.
pub fn default_rate_limits() -> Vec<RateLimitConfig> {
    vec![
        RateLimitConfig::new("ledger_submit", 3600, 10, Some(5)),
        RateLimitConfig::new("ledger_query", 60, 60, Some(10)),
        RateLimitConfig::new("account_probe", 60, 20, Some(5)),
        RateLimitConfig::new("foodrepo_lookup", 60, 20, Some(5)),
        RateLimitConfig::new("ipfs_add", 60, 30, Some(10)),
        RateLimitConfig::new("bigchaindb_create", 3600, 10, Some(3)),
    ]
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Record metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: WalletConfig = toml::from_str("").unwrap();
        assert_eq!(config.network.request_timeout_secs, 20);
        assert_eq!(config.signer.expiry_window, 8);
        assert_eq!(config.vault.scheme, VaultScheme::Modern);
        assert!(config.rate_limits.is_empty());
    }

    #[test]
    fn test_parse_rate_limits() {
        let config: WalletConfig = toml::from_str(
            r#"
            [vault]
            scheme = "legacy"

            [[rate_limits]]
            name = "ledger_submit"
            window_secs = 60
            max_events = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.vault.scheme, VaultScheme::Legacy);
        assert_eq!(config.rate_limits[0].burst, None);
        assert_eq!(config.rate_limits[0].burst_window_secs, 1);
    }
}
