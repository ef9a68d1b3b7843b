//! Cooperative cancellation for in-flight discoveries.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Signals every fetch of a discovery to stop.
///
/// Cancellation is idempotent: the first reason is kept. Fetches that have
/// already completed keep their results; pending ones are reported as
/// [`FetchError::Cancelled`](crate::errors::FetchError::Cancelled).
#[derive(Default)]
pub struct CancellationToken {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
    notify: Notify,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes all waiters.
    pub fn cancel(&self, reason: impl Into<String>) {
        // The reason is stored before the flag becomes visible.
        let mut slot = self.reason.write();
        if self.is_cancelled() {
            return;
        }
        let reason = reason.into();
        tracing::debug!(reason = %reason, "Discovery cancelled");
        *slot = Some(reason);
        self.cancelled.store(true, Ordering::SeqCst);
        drop(slot);
        self.notify.notify_waiters();
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancellationToken::new();
        token.cancel("client went away");
        token.cancel("deadline");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("client went away".to_string()));
    }

    #[test]
    fn test_reason_visible_once_cancelled() {
        for _ in 0..200 {
            let token = Arc::new(CancellationToken::new());
            let observer = {
                let token = token.clone();
                std::thread::spawn(move || {
                    while !token.is_cancelled() {
                        std::hint::spin_loop();
                    }
                    token.reason()
                })
            };
            token.cancel("shutdown");
            assert_eq!(observer.join().unwrap(), Some("shutdown".to_string()));
        }
    }

    #[tokio::test]
    async fn test_cancelled_resolves_for_waiters() {
        let token = Arc::new(CancellationToken::new());
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel("stop");

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel("early");
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("should not block");
    }
}
