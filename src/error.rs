//! Error taxonomy shared by the vault, endpoint manager, signer and submitter.
//!
//! # Design Decisions
//! - Recoverable conditions are typed variants, never panics
//! - Messages never carry key material or passwords
//! - Wrong password and corrupted entries stay distinct here (for logs) but
//!   share one [`WalletError::user_message`]

use thiserror::Error;

/// Errors that can occur in the wallet core.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Password did not match the stored verification hash.
    #[error("Authentication failed")]
    Auth,

    /// A vault entry failed its integrity check or could not be decrypted.
    #[error("Vault entry {index} is corrupt: {reason}")]
    CorruptEntry { index: u32, reason: String },

    /// No account is stored (or none is active).
    #[error("Account not found")]
    AccountNotFound,

    /// `switch_account`/`remove_account` referenced an unknown index.
    #[error("Account index {0} out of range")]
    IndexOutOfRange(u32),

    /// Key material is malformed or uses an unsupported algorithm.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The supplied public key is not derived from the supplied private key.
    #[error("Public key does not match private key")]
    KeyMismatch,

    /// The account is already present in the vault.
    #[error("Account already exists at index {0}")]
    DuplicateAccount(u32),

    /// `create` was called on an initialised vault.
    #[error("Vault already initialized")]
    VaultExists,

    /// The vault has not been created yet.
    #[error("Vault not initialized")]
    VaultNotInitialized,

    /// Password rejected by the password policy.
    #[error("Password must be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    /// Every endpoint failed (or is cooling down).
    #[error("Network error: {0}")]
    Network(String),

    /// The ledger answered with an error reply (e.g. `actNotFound`).
    #[error("Ledger error {code}: {message}")]
    Ledger { code: String, message: String },

    /// Transaction could not be serialized. Fatal for these inputs.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Transaction could not be signed. Fatal for these inputs.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Network fee is above the configured ceiling.
    #[error("Fee {current_drops} drops exceeds maximum {max_drops} drops")]
    FeeTooHigh { current_drops: u64, max_drops: u64 },

    /// The ledger definitively rejected the transaction.
    #[error("Submission rejected: {code}")]
    SubmissionRejected { code: String },

    /// The expiry ledger bound passed without validation. Rebuild required.
    #[error("Transaction {hash} expired after ledger {last_ledger_sequence}")]
    TransactionExpired {
        hash: String,
        last_ledger_sequence: u32,
    },

    /// Admission denied by the rate limiter.
    #[error("Rate limited on '{resource}', retry after {retry_after_secs:.1}s")]
    RateLimited {
        resource: String,
        retry_after_secs: f64,
    },

    /// Polling was cancelled by the caller. The transaction may still apply.
    #[error("Polling cancelled for transaction {hash}")]
    Cancelled { hash: String },

    /// Key-value store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration or input parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background worker failed or panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

impl WalletError {
    /// Transient conditions that a caller may retry with the same inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Network(_) | WalletError::RateLimited { .. })
    }

    /// Conditions that must never be retried with the same inputs.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WalletError::Serialization(_)
                | WalletError::Signing(_)
                | WalletError::SubmissionRejected { .. }
                | WalletError::TransactionExpired { .. }
        )
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            WalletError::Auth | WalletError::CorruptEntry { .. } => {
                "Wrong password, try again".to_string()
            }
            WalletError::Network(_) => {
                "Network unavailable. Please check your connection and try again.".to_string()
            }
            WalletError::SubmissionRejected { code } => {
                crate::ledger::result_codes::status_message(code)
            }
            WalletError::TransactionExpired { .. } => {
                "Transaction expired before confirmation. Please try again.".to_string()
            }
            WalletError::RateLimited {
                retry_after_secs, ..
            } => format!(
                "Too many requests. Try again in {} seconds.",
                retry_after_secs.ceil() as u64
            ),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(e: tokio::task::JoinError) -> Self {
        WalletError::Internal(format!("worker failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_and_corruption_share_user_message() {
        let auth = WalletError::Auth;
        let corrupt = WalletError::CorruptEntry {
            index: 2,
            reason: "tag mismatch".into(),
        };
        assert_eq!(auth.user_message(), corrupt.user_message());
        assert_ne!(auth.to_string(), corrupt.to_string());
    }

    #[test]
    fn test_classification() {
        assert!(WalletError::Network("down".into()).is_retryable());
        assert!(!WalletError::Signing("bad".into()).is_retryable());
        assert!(WalletError::Serialization("bad".into()).is_fatal());
        assert!(WalletError::TransactionExpired {
            hash: "AB".into(),
            last_ledger_sequence: 10
        }
        .is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = WalletError::FeeTooHigh {
            current_drops: 600,
            max_drops: 500,
        };
        assert!(err.to_string().contains("600"));

        let err = WalletError::RateLimited {
            resource: "ledger_submit".into(),
            retry_after_secs: 2.2,
        };
        assert_eq!(err.user_message(), "Too many requests. Try again in 3 seconds.");
    }
}
