//! Cooperative cancellation of an in-flight exchange.
//!
//! A [`Cancellation`] is shared between the thread that notices the user's interrupt (usually a
//! `ctrlc` handler) and the task draining the response.  The drain loop races the next line
//! against [`Cancellation::cancelled`], so a stalled read is abandoned as soon as the flag flips.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A clonable, resettable cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Cancellation {
    /// Creates a flag that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.  Safe to call from any thread, including signal handlers.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Clears the flag ahead of the next exchange.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Returns true once [`Cancellation::cancel`] has been called since the last reset.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves when the flag is set.
    pub async fn cancelled(&self) {
        // A permit left over from an earlier cancel wakes us spuriously; the flag decides.
        while !self.is_cancelled() {
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let cancel = Cancellation::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancelled().await })
        };
        tokio::task::yield_now().await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_before_wait_is_observed() {
        let cancel = Cancellation::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .expect("already cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_stale_cancel() {
        let cancel = Cancellation::new();
        cancel.cancel();
        cancel.reset();
        assert!(!cancel.is_cancelled());
        let waited = tokio::time::timeout(Duration::from_secs(1), cancel.cancelled()).await;
        assert!(waited.is_err(), "a reset flag must not resolve");
    }
}
