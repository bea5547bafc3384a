//! State shared by one scheduler and all of its tracks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use storyline_core::clock::Clock;
use storyline_core::event::EventState;
use storyline_core::notification::FlowNotification;
use storyline_core::outcome::Outcome;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::services::ServiceRegistry;
use crate::signal::SignalRegistry;

const NOTIFICATION_CAPACITY: usize = 256;

/// Everything a track needs from its owning scheduler.
///
/// One instance per scheduler, handed to every track by `Arc` at
/// construction. There are no ambient statics: independent schedulers can
/// coexist in one process (and do, in tests).
pub(crate) struct FlowShared {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) signals: SignalRegistry,
    pub(crate) services: ServiceRegistry,
    /// Root cancellation token for every track loop, execution, and wait.
    pub(crate) cancel: CancellationToken,
    /// Global completion ledger, last-write-wins per event id across all
    /// tracks.
    history: Mutex<HashMap<String, Outcome>>,
    pause_tx: watch::Sender<bool>,
    /// Keeps the pause channel open even with no track subscribed yet.
    _pause_rx: watch::Receiver<bool>,
    notifications: broadcast::Sender<FlowNotification>,
}

impl FlowShared {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        let (pause_tx, pause_rx) = watch::channel(false);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            clock,
            signals: SignalRegistry::new(),
            services: ServiceRegistry::new(),
            cancel: CancellationToken::new(),
            history: Mutex::new(HashMap::new()),
            pause_tx,
            _pause_rx: pause_rx,
            notifications,
        }
    }

    /// Subscribes a track to the global pause gate.
    pub(crate) fn pause_gate(&self) -> watch::Receiver<bool> {
        self.pause_tx.subscribe()
    }

    pub(crate) fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }

    /// Pauses every track. Idempotent: pausing while paused is a no-op.
    pub(crate) fn pause(&self, reason: &str) {
        if *self.pause_tx.borrow() {
            debug!(reason, "pause requested while already paused");
            return;
        }
        info!(reason, "story flow paused");
        let _ = self.pause_tx.send(true);
    }

    /// Releases every track parked on the pause gate. Idempotent.
    pub(crate) fn resume(&self) {
        if !*self.pause_tx.borrow() {
            return;
        }
        info!("story flow resumed");
        let _ = self.pause_tx.send(false);
    }

    /// Records `outcome` for `event_id` in the completion ledger.
    pub(crate) fn record_outcome(&self, event_id: &str, outcome: &Outcome) {
        self.history
            .lock()
            .expect("history lock poisoned")
            .insert(event_id.to_owned(), outcome.clone());
    }

    pub(crate) fn story_event_result(&self, event_id: &str) -> Option<Outcome> {
        self.history
            .lock()
            .expect("history lock poisoned")
            .get(event_id)
            .cloned()
    }

    pub(crate) fn has_event_completed(&self, event_id: &str) -> bool {
        self.story_event_result(event_id)
            .is_some_and(|outcome| outcome.state == EventState::Completed)
    }

    pub(crate) fn clear_history(&self) {
        self.history
            .lock()
            .expect("history lock poisoned")
            .clear();
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<FlowNotification> {
        self.notifications.subscribe()
    }

    /// Broadcasts a lifecycle notification. A missing or lagging subscriber
    /// never affects scheduling.
    pub(crate) fn notify(&self, notification: FlowNotification) {
        let _ = self.notifications.send(notification);
    }
}
