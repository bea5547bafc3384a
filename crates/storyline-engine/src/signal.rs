//! Signal registry — named one-shot rendezvous between events and emitters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use storyline_core::error::EngineError;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Single-shot waiter shared by every concurrent wait on one signal name.
#[derive(Default)]
struct SignalWaiter {
    notify: Notify,
    fired: AtomicBool,
}

/// Name → waiter map with rendezvous semantics.
///
/// At most one live waiter object per name: concurrent waits on the same
/// name before it fires share one wakeup. An emit with no pending waiter is
/// lost, not buffered — a rendezvous, not a mailbox.
#[derive(Default)]
pub(crate) struct SignalRegistry {
    waiters: Mutex<HashMap<String, Arc<SignalWaiter>>>,
}

impl SignalRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Blocks until `name` is emitted or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Cancelled` when `cancel` fires first.
    pub(crate) async fn wait(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let waiter = {
            let mut waiters = self.waiters.lock().expect("signal registry lock poisoned");
            match waiters.get(name) {
                // Join the pending waiter; everyone completes together.
                Some(existing) if !existing.fired.load(Ordering::Acquire) => Arc::clone(existing),
                _ => {
                    let fresh = Arc::new(SignalWaiter::default());
                    waiters.insert(name.to_owned(), Arc::clone(&fresh));
                    fresh
                }
            }
        };

        trace!(signal = name, "waiting for signal");
        let result = loop {
            // Register interest before checking `fired` so an emit between
            // the check and the await cannot be lost.
            let notified = waiter.notify.notified();
            if waiter.fired.load(Ordering::Acquire) {
                break Ok(());
            }
            tokio::select! {
                () = notified => {}
                () = cancel.cancelled() => break Err(EngineError::Cancelled),
            }
        };

        // Drop the entry if it is still ours and no longer pending, so stale
        // waiters do not accumulate.
        let mut waiters = self.waiters.lock().expect("signal registry lock poisoned");
        if let Some(current) = waiters.get(name) {
            if Arc::ptr_eq(current, &waiter) && waiter.fired.load(Ordering::Acquire) {
                waiters.remove(name);
            }
        }

        result
    }

    /// Emits `name`: removes and fires any pending waiter. Returns whether a
    /// waiter existed.
    pub(crate) fn signal(&self, name: &str) -> bool {
        let waiter = self
            .waiters
            .lock()
            .expect("signal registry lock poisoned")
            .remove(name);
        match waiter {
            Some(waiter) => {
                waiter.fired.store(true, Ordering::Release);
                waiter.notify.notify_waiters();
                debug!(signal = name, "signal delivered");
                true
            }
            None => {
                debug!(signal = name, "signal emitted with no waiter");
                false
            }
        }
    }

    /// Number of pending waiter entries (diagnostics).
    pub(crate) fn pending(&self) -> usize {
        self.waiters
            .lock()
            .expect("signal registry lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_signal_wakes_waiter_and_reports_delivery() {
        // Arrange
        let registry = Arc::new(SignalRegistry::new());
        let cancel = CancellationToken::new();
        let waiting = {
            let registry = Arc::clone(&registry);
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.wait("door-open", &cancel).await })
        };
        tokio::task::yield_now().await;

        // Act
        let delivered = registry.signal("door-open");

        // Assert
        assert!(delivered);
        let result = tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .expect("waiter should wake")
            .expect("task should not panic");
        assert!(result.is_ok());
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn test_signal_with_no_waiter_is_lost() {
        // Arrange
        let registry = Arc::new(SignalRegistry::new());
        let cancel = CancellationToken::new();

        // Act: emit before anyone waits.
        let delivered = registry.signal("early");

        // Assert: not buffered — a later wait still blocks.
        assert!(!delivered);
        let registry_for_wait = Arc::clone(&registry);
        let cancel_for_wait = cancel.clone();
        let wait = tokio::spawn(async move { registry_for_wait.wait("early", &cancel_for_wait).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!wait.is_finished());

        cancel.cancel();
        let result = wait.await.expect("task should not panic");
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_concurrent_waits_share_one_wakeup() {
        // Arrange
        let registry = Arc::new(SignalRegistry::new());
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let registry = Arc::clone(&registry);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(
                async move { registry.wait("shared", &cancel).await },
            ));
        }
        tokio::task::yield_now().await;
        assert_eq!(registry.pending(), 1);

        // Act
        let delivered = registry.signal("shared");

        // Assert: one emit completes every joined wait.
        assert!(delivered);
        for handle in handles {
            let result = tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("waiter should wake")
                .expect("task should not panic");
            assert!(result.is_ok());
        }
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn test_wait_after_delivery_creates_fresh_waiter() {
        // Arrange
        let registry = Arc::new(SignalRegistry::new());
        let cancel = CancellationToken::new();
        let first = {
            let registry = Arc::clone(&registry);
            let cancel = cancel.clone();
            tokio::spawn(async move { registry.wait("repeat", &cancel).await })
        };
        tokio::task::yield_now().await;
        assert!(registry.signal("repeat"));
        first
            .await
            .expect("task should not panic")
            .expect("first wait should resolve");

        // Act: a second wait must not observe the consumed emit.
        let registry_for_wait = Arc::clone(&registry);
        let cancel_for_wait = cancel.clone();
        let second =
            tokio::spawn(async move { registry_for_wait.wait("repeat", &cancel_for_wait).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Assert
        assert!(!second.is_finished());
        assert!(registry.signal("repeat"));
        second
            .await
            .expect("task should not panic")
            .expect("second wait should resolve");
    }
}
