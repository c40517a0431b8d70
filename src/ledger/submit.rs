//! Submit-and-confirm with bounded retries and expiry.
//!
//! # Responsibilities
//! - Submit a signed blob, retrying network failures with backoff
//! - Poll by hash until a validated verdict or the expiry bound passes
//! - Replay recorded verdicts for a blob submitted twice
//! - Run in the background with progress and cancellation
//!
//! # Design Decisions
//! - The validated ledger index is read before each lookup, so a transaction
//!   validated at or before the bound is never reported expired
//! - An expired blob is never resubmitted; the caller must build afresh
//! - Cancellation stops polling only; a submitted blob may still apply

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::SubmitterConfig;
use crate::error::{WalletError, WalletResult};
use crate::ledger::result_codes::{self, ResultClass};
use crate::ledger::transaction::{SignedBlob, SubmissionState, TransactionEnvelope};
use crate::observability::metrics;
use crate::resilience::calculate_backoff;
use crate::rpc::{LedgerClient, SubmitResult};

/// Terminal verdict of a validated transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    ValidatedSuccess {
        hash: String,
        fee_drops: u64,
        result_code: String,
        ledger_index: Option<u32>,
    },
    ValidatedFailure {
        hash: String,
        fee_drops: u64,
        result_code: String,
        ledger_index: Option<u32>,
    },
}

impl SubmissionOutcome {
    pub fn hash(&self) -> &str {
        match self {
            SubmissionOutcome::ValidatedSuccess { hash, .. }
            | SubmissionOutcome::ValidatedFailure { hash, .. } => hash,
        }
    }

    pub fn result_code(&self) -> &str {
        match self {
            SubmissionOutcome::ValidatedSuccess { result_code, .. }
            | SubmissionOutcome::ValidatedFailure { result_code, .. } => result_code,
        }
    }

    pub fn fee_drops(&self) -> u64 {
        match self {
            SubmissionOutcome::ValidatedSuccess { fee_drops, .. }
            | SubmissionOutcome::ValidatedFailure { fee_drops, .. } => *fee_drops,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::ValidatedSuccess { .. })
    }

    pub fn state(&self) -> SubmissionState {
        if self.is_success() {
            SubmissionState::ValidatedSuccess
        } else {
            SubmissionState::ValidatedFailure
        }
    }

    /// User-facing text for the verdict.
    pub fn status_message(&self) -> String {
        result_codes::status_message(self.result_code())
    }
}

/// Progress reported while a submission runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SubmissionEvent {
    Submitted {
        hash: String,
        engine_result: String,
    },
    Retrying {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    Polling {
        hash: String,
        validated_ledger: u32,
        last_ledger_sequence: u32,
    },
    Finished {
        hash: String,
        state: SubmissionState,
    },
}

#[derive(Debug, Clone)]
enum Recorded {
    Validated(SubmissionOutcome),
    Expired { last_ledger_sequence: u32 },
}

/// Result of a background submission.
#[derive(Debug)]
pub struct SubmissionReport {
    pub envelope: TransactionEnvelope,
    pub result: WalletResult<SubmissionOutcome>,
}

/// Handle to a background submission.
#[derive(Debug)]
pub struct SubmissionHandle {
    hash: String,
    result: oneshot::Receiver<SubmissionReport>,
    pub progress: mpsc::Receiver<SubmissionEvent>,
    cancel: watch::Sender<bool>,
}

impl SubmissionHandle {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Stop polling. The transaction may still be applied by the ledger.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// A sender that cancels this submission from elsewhere.
    pub fn cancel_token(&self) -> watch::Sender<bool> {
        self.cancel.clone()
    }

    /// Wait for the final report.
    pub async fn join(self) -> WalletResult<SubmissionReport> {
        self.result
            .await
            .map_err(|_| WalletError::Internal("submission task ended without a report".into()))
    }
}

struct Reporter<'a> {
    progress: Option<&'a mpsc::Sender<SubmissionEvent>>,
}

impl Reporter<'_> {
    fn emit(&self, event: SubmissionEvent) {
        if let Some(tx) = self.progress {
            // Progress is best-effort; a slow consumer must not stall polling.
            let _ = tx.try_send(event);
        }
    }
}

/// Submits signed blobs and waits for validated verdicts.
pub struct ResilientSubmitter {
    client: Arc<LedgerClient>,
    config: SubmitterConfig,
    recorded: DashMap<String, Recorded>,
}

impl ResilientSubmitter {
    pub fn new(client: Arc<LedgerClient>, config: SubmitterConfig) -> Self {
        Self {
            client,
            config,
            recorded: DashMap::new(),
        }
    }

    /// Submit and wait for a terminal verdict.
    pub async fn submit_and_wait(
        &self,
        blob: &SignedBlob,
        envelope: &mut TransactionEnvelope,
    ) -> WalletResult<SubmissionOutcome> {
        self.run(blob, envelope, None, None).await
    }

    /// Like [`submit_and_wait`](Self::submit_and_wait), stopping when `cancel` turns true.
    pub async fn submit_and_wait_with(
        &self,
        blob: &SignedBlob,
        envelope: &mut TransactionEnvelope,
        cancel: watch::Receiver<bool>,
        progress: Option<mpsc::Sender<SubmissionEvent>>,
    ) -> WalletResult<SubmissionOutcome> {
        self.run(blob, envelope, Some(cancel), progress.as_ref()).await
    }

    /// Run the submission on a spawned task.
    pub fn spawn(self: &Arc<Self>, blob: SignedBlob, mut envelope: TransactionEnvelope) -> SubmissionHandle {
        let (result_tx, result_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = mpsc::channel(32);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let hash = blob.hash.clone();
        let submitter = Arc::clone(self);

        tokio::spawn(async move {
            let result = submitter
                .run(&blob, &mut envelope, Some(cancel_rx), Some(&progress_tx))
                .await;
            let _ = result_tx.send(SubmissionReport { envelope, result });
        });

        SubmissionHandle {
            hash,
            result: result_rx,
            progress: progress_rx,
            cancel: cancel_tx,
        }
    }

    /// Verdict previously recorded for `hash`, if any.
    pub fn recorded_outcome(&self, hash: &str) -> Option<SubmissionOutcome> {
        match self.recorded.get(hash).map(|r| r.value().clone()) {
            Some(Recorded::Validated(outcome)) => Some(outcome),
            _ => None,
        }
    }

    /// Expiry bound recorded for `hash` once the ledger passed it.
    pub fn recorded_expiry(&self, hash: &str) -> Option<u32> {
        match self.recorded.get(hash).map(|r| r.value().clone()) {
            Some(Recorded::Expired {
                last_ledger_sequence,
            }) => Some(last_ledger_sequence),
            _ => None,
        }
    }

    async fn run(
        &self,
        blob: &SignedBlob,
        envelope: &mut TransactionEnvelope,
        mut cancel: Option<watch::Receiver<bool>>,
        progress: Option<&mpsc::Sender<SubmissionEvent>>,
    ) -> WalletResult<SubmissionOutcome> {
        let reporter = Reporter { progress };
        let hash = blob.hash.clone();

        if envelope.state == SubmissionState::Expired {
            return Err(WalletError::TransactionExpired {
                hash,
                last_ledger_sequence: self
                    .recorded_expiry(&blob.hash)
                    .unwrap_or(blob.last_ledger_sequence),
            });
        }
        if let Some(recorded) = self.recorded.get(&hash).map(|r| r.value().clone()) {
            match recorded {
                Recorded::Validated(outcome) => {
                    tracing::info!(hash = %hash, "Returning recorded verdict without resubmitting");
                    envelope.state = outcome.state();
                    return Ok(outcome);
                }
                Recorded::Expired {
                    last_ledger_sequence,
                } => {
                    tracing::info!(hash = %hash, last_ledger_sequence, "Transaction already expired");
                    envelope.state = SubmissionState::Expired;
                    return Err(WalletError::TransactionExpired {
                        hash,
                        last_ledger_sequence,
                    });
                }
            }
        }

        let submitted = self.submit_with_retry(blob, &mut cancel, &reporter).await?;
        let engine_result = submitted.engine_result.clone();
        tracing::info!(hash = %hash, engine_result = %engine_result, "Transaction submitted");
        reporter.emit(SubmissionEvent::Submitted {
            hash: hash.clone(),
            engine_result: engine_result.clone(),
        });

        if result_codes::is_definitive_rejection(&engine_result) {
            tracing::warn!(hash = %hash, engine_result = %engine_result, "Transaction rejected");
            metrics::record_submission("rejected");
            return Err(WalletError::SubmissionRejected {
                code: engine_result,
            });
        }

        let result = self.poll(blob, envelope, &mut cancel, &reporter).await;
        match &result {
            Ok(outcome) => {
                envelope.state = outcome.state();
                self.recorded
                    .insert(hash.clone(), Recorded::Validated(outcome.clone()));
                metrics::record_submission(if outcome.is_success() { "success" } else { "failure" });
                reporter.emit(SubmissionEvent::Finished {
                    hash: hash.clone(),
                    state: envelope.state,
                });
            }
            Err(WalletError::TransactionExpired {
                last_ledger_sequence,
                ..
            }) => {
                envelope.state = SubmissionState::Expired;
                self.recorded.insert(
                    hash.clone(),
                    Recorded::Expired {
                        last_ledger_sequence: *last_ledger_sequence,
                    },
                );
                metrics::record_submission("expired");
                reporter.emit(SubmissionEvent::Finished {
                    hash: hash.clone(),
                    state: SubmissionState::Expired,
                });
            }
            Err(WalletError::Cancelled { .. }) => metrics::record_submission("cancelled"),
            Err(_) => metrics::record_submission("network"),
        }
        result
    }

    async fn submit_with_retry(
        &self,
        blob: &SignedBlob,
        cancel: &mut Option<watch::Receiver<bool>>,
        reporter: &Reporter<'_>,
    ) -> WalletResult<SubmitResult> {
        let max_attempts = self.config.max_submit_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.client.submit(&blob.tx_blob).await {
                Ok(result) => return Ok(result),
                Err(WalletError::Ledger { code, message }) => {
                    tracing::warn!(hash = %blob.hash, code = %code, message = %message, "Submit refused");
                    metrics::record_submission("rejected");
                    return Err(WalletError::SubmissionRejected { code });
                }
                Err(e @ WalletError::Network(_)) if attempt < max_attempts => {
                    let delay = calculate_backoff(
                        attempt,
                        self.config.backoff_base_ms,
                        self.config.backoff_max_ms,
                    );
                    tracing::warn!(
                        hash = %blob.hash,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Submit failed, retrying"
                    );
                    reporter.emit(SubmissionEvent::Retrying {
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                        error: e.to_string(),
                    });
                    if pause(delay, cancel).await {
                        return Err(WalletError::Cancelled {
                            hash: blob.hash.clone(),
                        });
                    }
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(hash = %blob.hash, attempt, error = %e, "Submit failed");
                    metrics::record_submission("network");
                    return Err(e);
                }
            }
        }
    }

    async fn poll(
        &self,
        blob: &SignedBlob,
        envelope: &TransactionEnvelope,
        cancel: &mut Option<watch::Receiver<bool>>,
        reporter: &Reporter<'_>,
    ) -> WalletResult<SubmissionOutcome> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut failures = 0u32;

        loop {
            if pause(interval, cancel).await {
                tracing::info!(hash = %blob.hash, "Polling cancelled");
                return Err(WalletError::Cancelled {
                    hash: blob.hash.clone(),
                });
            }

            let lookup = async {
                let validated = self.client.validated_ledger_index().await?;
                let status = self.client.tx(&blob.hash).await?;
                Ok::<_, WalletError>((validated, status))
            };

            let (validated, status) = match lookup.await {
                Ok(found) => {
                    failures = 0;
                    found
                }
                Err(WalletError::Network(msg)) => {
                    failures += 1;
                    tracing::warn!(hash = %blob.hash, failures, error = %msg, "Status poll failed");
                    if failures > self.config.max_poll_failures {
                        return Err(WalletError::Network(msg));
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(status) = status.filter(|s| s.validated) {
                if let Some(code) = status.result_code {
                    let fee_drops = status.fee_drops.unwrap_or(envelope.fee_drops);
                    tracing::info!(hash = %blob.hash, result = %code, fee_drops, "Transaction validated");
                    let outcome = if result_codes::classify(&code) == ResultClass::Success {
                        SubmissionOutcome::ValidatedSuccess {
                            hash: blob.hash.clone(),
                            fee_drops,
                            result_code: code,
                            ledger_index: status.ledger_index,
                        }
                    } else {
                        SubmissionOutcome::ValidatedFailure {
                            hash: blob.hash.clone(),
                            fee_drops,
                            result_code: code,
                            ledger_index: status.ledger_index,
                        }
                    };
                    return Ok(outcome);
                }
            }

            if validated > blob.last_ledger_sequence {
                tracing::warn!(
                    hash = %blob.hash,
                    validated_ledger = validated,
                    last_ledger_sequence = blob.last_ledger_sequence,
                    "Transaction expired"
                );
                return Err(WalletError::TransactionExpired {
                    hash: blob.hash.clone(),
                    last_ledger_sequence: blob.last_ledger_sequence,
                });
            }

            tracing::debug!(hash = %blob.hash, validated_ledger = validated, "Awaiting validation");
            reporter.emit(SubmissionEvent::Polling {
                hash: blob.hash.clone(),
                validated_ledger: validated,
                last_ledger_sequence: blob.last_ledger_sequence,
            });
        }
    }
}

/// Sleep for `duration`. Returns true if cancellation was requested.
async fn pause(duration: Duration, cancel: &mut Option<watch::Receiver<bool>>) -> bool {
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    loop {
        let Some(rx) = cancel.as_mut() else {
            (&mut sleep).await;
            return false;
        };
        if *rx.borrow_and_update() {
            return true;
        }
        let closed = tokio::select! {
            _ = &mut sleep => return false,
            changed = rx.changed() => changed.is_err(),
        };
        if closed {
            // Sender gone: nobody can cancel any more.
            *cancel = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pause_without_cancel_sleeps() {
        let start = tokio::time::Instant::now();
        assert!(!pause(Duration::from_secs(2), &mut None).await);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_returns_on_cancel() {
        let (tx, rx) = watch::channel(false);
        let mut cancel = Some(rx);
        let waiter = tokio::spawn(async move { pause(Duration::from_secs(60), &mut cancel).await });

        tokio::time::advance(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_survives_dropped_sender() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut cancel = Some(rx);
        assert!(!pause(Duration::from_secs(1), &mut cancel).await);
        assert!(cancel.is_none());
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = SubmissionOutcome::ValidatedFailure {
            hash: "AB".into(),
            fee_drops: 12,
            result_code: "tecNO_DST".into(),
            ledger_index: Some(9),
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.state(), SubmissionState::ValidatedFailure);
        assert_eq!(outcome.status_message(), "Destination account does not exist");
        assert_eq!(outcome.fee_drops(), 12);
    }
}
