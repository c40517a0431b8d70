//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{default_rate_limits, RateLimitConfig, WalletConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the `max_events` of the `ledger_submit` limiter.
pub const TX_RATE_ENV_VAR: &str = "WALLET_TX_RATE";

/// Comma-separated endpoint list overriding `network.endpoints`.
pub const ENDPOINTS_ENV_VAR: &str = "WALLET_ENDPOINTS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env(String),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env(msg) => write!(f, "Environment error: {}", msg),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// A missing file yields the defaults; environment overrides apply either way.
pub fn load_config(path: &Path) -> Result<WalletConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        parse_config(&content)?
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
        WalletConfig::default()
    };

    if config.rate_limits.is_empty() {
        config.rate_limits = default_rate_limits();
    }

    apply_env_overrides(
        &mut config,
        std::env::var(TX_RATE_ENV_VAR).ok(),
        std::env::var(ENDPOINTS_ENV_VAR).ok(),
    )?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration text without validation.
pub fn parse_config(content: &str) -> Result<WalletConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

fn apply_env_overrides(
    config: &mut WalletConfig,
    tx_rate: Option<String>,
    endpoints: Option<String>,
) -> Result<(), ConfigError> {
    if let Some(raw) = tx_rate {
        let rate: u32 = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env(format!("{} must be an integer, got '{}'", TX_RATE_ENV_VAR, raw)))?;
        let burst = Some(rate.min(5));
        match config.rate_limits.iter_mut().find(|l| l.name == "ledger_submit") {
            Some(limit) => {
                limit.max_events = rate;
                limit.burst = burst;
            }
            None => config
                .rate_limits
                .push(RateLimitConfig::new("ledger_submit", 3600, rate, burst)),
        }
        tracing::debug!(rate, "Applied transaction rate override");
    }

    if let Some(raw) = endpoints {
        let list: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !list.is_empty() {
            config.network.endpoints = list;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [network]
            endpoints = ["http://127.0.0.1:5005"]
            request_timeout_secs = 15
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.network.endpoints, vec!["http://127.0.0.1:5005"]);
        assert_eq!(config.network.request_timeout_secs, 15);
        // Missing rate limits fall back to the defaults
        assert!(config.rate_limits.iter().any(|l| l.name == "ledger_submit"));
    }

    #[test]
    fn test_invalid_file_reports_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network]\nrequest_timeout_secs = 600").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = WalletConfig {
            rate_limits: default_rate_limits(),
            ..Default::default()
        };
        apply_env_overrides(
            &mut config,
            Some("3".into()),
            Some("http://a:1, http://b:2".into()),
        )
        .unwrap();

        let submit = config
            .rate_limits
            .iter()
            .find(|l| l.name == "ledger_submit")
            .unwrap();
        assert_eq!(submit.max_events, 3);
        assert_eq!(submit.burst, Some(3));
        assert_eq!(config.network.endpoints, vec!["http://a:1", "http://b:2"]);

        let err = apply_env_overrides(&mut config, Some("ten".into()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }
}
