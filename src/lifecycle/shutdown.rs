//! Cancellation coordination for long-running submissions.

use tokio::sync::watch;

/// Coordinator for cooperative cancellation.
///
/// Hands out `watch` receivers that [`crate::ledger::ResilientSubmitter`]
/// checks between polls.
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A cancel token that turns `true` once [`Shutdown::trigger`] runs.
    pub fn token(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Number of tokens still alive.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_sees_trigger() {
        let shutdown = Shutdown::new();
        let mut token = shutdown.token();
        assert!(!*token.borrow());

        shutdown.trigger();
        token.changed().await.unwrap();
        assert!(*token.borrow());

        // Tokens handed out after the trigger are already cancelled.
        assert!(*shutdown.token().borrow());
        assert!(shutdown.is_triggered());
    }
}
