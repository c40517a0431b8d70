//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap ledger calls with a deadline
//! - Cancel the wrapped future cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors become `WalletError::Network`, distinct from ledger errors

use std::future::Future;
use std::time::Duration;

use crate::error::{WalletError, WalletResult};

/// Run `fut` with a deadline; elapsed deadlines become a network error naming `what`.
pub async fn with_timeout<T, F>(duration: Duration, what: &str, fut: F) -> WalletResult<T>
where
    F: Future<Output = WalletResult<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(WalletError::Network(format!(
            "{} timed out after {}s",
            what,
            duration.as_secs_f64()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_network_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, WalletError>(1)
        };
        let err = with_timeout(Duration::from_secs(20), "server_info", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Network(ref m) if m.contains("server_info")));

        let fast = async { Ok::<_, WalletError>(2) };
        assert_eq!(with_timeout(Duration::from_secs(1), "fee", fast).await.unwrap(), 2);
    }
}
