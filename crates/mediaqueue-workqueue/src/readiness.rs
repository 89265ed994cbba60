//! One-shot readiness signal.

use tokio::sync::watch;

/// Fires once when the worker pools have finished initializing.
///
/// Clones share the same signal. Waiting after the signal fired returns
/// immediately.
#[derive(Debug, Clone)]
pub struct ReadinessSignal {
    tx: watch::Sender<bool>,
}

impl ReadinessSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Mark ready and wake all waiters.
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_after_fire_returns() {
        let signal = ReadinessSignal::new();
        assert!(!signal.is_ready());
        signal.fire();
        assert!(signal.is_ready());
        signal.wait().await;
    }

    #[tokio::test]
    async fn test_waiters_are_woken() {
        let signal = ReadinessSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.fire();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_fire_is_idempotent() {
        let signal = ReadinessSignal::default();
        signal.fire();
        signal.fire();
        assert!(signal.is_ready());
    }
}
