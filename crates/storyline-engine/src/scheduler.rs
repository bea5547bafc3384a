//! Flow scheduler — owner of the main track, auxiliary tracks, history,
//! signals, and services.

use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use storyline_core::clock::{Clock, SystemClock};
use storyline_core::context::FlowContext;
use storyline_core::error::EngineError;
use storyline_core::event::StoryEvent;
use storyline_core::notification::FlowNotification;
use storyline_core::outcome::Outcome;
use storyline_core::sequence::Sequence;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::EventContext;
use crate::shared::FlowShared;
use crate::track::{Track, TrackMode};

/// The story-flow scheduler.
///
/// Routes enqueue requests to the main track or to on-demand auxiliary
/// tracks, owns the global completion ledger and pause gate, and exposes
/// signal rendezvous and lifecycle notifications. All state is instance
/// state: independent schedulers coexist freely.
///
/// Construction spawns the main track loop, so a `FlowScheduler` must be
/// created inside a tokio runtime.
pub struct FlowScheduler {
    shared: Arc<FlowShared>,
    main: Arc<Track>,
    auxiliaries: Arc<Mutex<Vec<Arc<Track>>>>,
    aux_counter: AtomicU64,
}

impl FlowScheduler {
    /// Creates a scheduler on the system clock and starts its main track.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a scheduler on the given clock and starts its main track.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let shared = Arc::new(FlowShared::new(clock));
        let main = Arc::new(Track::new("main", TrackMode::Main, Arc::clone(&shared)));
        tokio::spawn(Arc::clone(&main).run());
        Self {
            shared,
            main,
            auxiliaries: Arc::new(Mutex::new(Vec::new())),
            aux_counter: AtomicU64::new(0),
        }
    }

    /// Enqueues a sequence on the main track. Returns the run ids of the
    /// materialized instances (empty for a sequence with no assigned
    /// events).
    pub fn enqueue_sequence(&self, sequence: &Arc<Sequence>, insert_at_front: bool) -> Vec<Uuid> {
        self.main.enqueue_sequence(sequence, insert_at_front)
    }

    /// Enqueues a single event.
    ///
    /// With a source sequence the event joins the main track as a
    /// one-element run of that sequence. With **no** source sequence the
    /// request is reinterpreted as independent execution and routed to a
    /// fresh auxiliary track — a compatibility quirk; prefer the explicit
    /// [`Self::run_independent`] / [`Self::enqueue_event_on_main`] calls.
    pub fn enqueue_event(
        &self,
        event: Arc<dyn StoryEvent>,
        insert_at_front: bool,
        source_sequence: Option<Arc<Sequence>>,
    ) -> Uuid {
        match source_sequence {
            Some(sequence) => self
                .main
                .enqueue_event(event, insert_at_front, Some(sequence)),
            None => self.run_independent(event),
        }
    }

    /// Enqueues a single sequence-less event on the main track.
    pub fn enqueue_event_on_main(&self, event: Arc<dyn StoryEvent>, insert_at_front: bool) -> Uuid {
        self.main.enqueue_event(event, insert_at_front, None)
    }

    /// Runs an event independently of the main track: a fresh auxiliary
    /// track is created, runs this one instance concurrently with every
    /// other track, and deregisters itself once drained.
    pub fn run_independent(&self, event: Arc<dyn StoryEvent>) -> Uuid {
        let label = format!("aux-{}", self.aux_counter.fetch_add(1, Ordering::SeqCst));
        let track = Arc::new(Track::new(
            label.clone(),
            TrackMode::Auxiliary,
            Arc::clone(&self.shared),
        ));
        let run_id = track.enqueue_event(event, false, None);
        self.auxiliaries
            .lock()
            .expect("auxiliary list lock poisoned")
            .push(Arc::clone(&track));
        debug!(track = %label, %run_id, "auxiliary track started");

        let auxiliaries = Arc::clone(&self.auxiliaries);
        tokio::spawn(async move {
            Arc::clone(&track).run().await;
            auxiliaries
                .lock()
                .expect("auxiliary list lock poisoned")
                .retain(|other| !Arc::ptr_eq(other, &track));
            debug!(track = %track.label(), "auxiliary track pruned");
        });
        run_id
    }

    /// Removes every queued main-track instance of `sequence` (pointer
    /// identity) and enqueues it fresh.
    pub fn restart_sequence(&self, sequence: &Arc<Sequence>, insert_at_front: bool) -> Vec<Uuid> {
        self.main.restart_sequence(sequence, insert_at_front)
    }

    /// Drops all queued main-track instances without cancelling the
    /// in-flight foreground execution.
    pub fn clear_story_queue(&self) {
        self.main.clear_queue();
    }

    /// Pauses every track. Idempotent.
    pub fn pause_story_flow(&self, reason: &str) {
        self.shared.pause(reason);
    }

    /// Releases every track parked on the pause gate. Idempotent.
    pub fn resume_story_flow(&self) {
        self.shared.resume();
    }

    /// Whether the global pause flag is set.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// Blocks until `signal_id` is emitted or the scheduler shuts down.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Cancelled` on shutdown while the wait is
    /// pending.
    pub async fn wait_for_signal(&self, signal_id: &str) -> Result<(), EngineError> {
        self.shared.signals.wait(signal_id, &self.shared.cancel).await
    }

    /// Emits `signal_id`; returns whether a waiter existed. An emit with no
    /// waiter is lost, not buffered.
    pub fn signal(&self, signal_id: &str) -> bool {
        self.shared.signals.signal(signal_id)
    }

    /// Returns the last recorded outcome for `event_id`.
    #[must_use]
    pub fn story_event_result(&self, event_id: &str) -> Option<Outcome> {
        self.shared.story_event_result(event_id)
    }

    /// Returns whether `event_id` has a recorded `Completed` outcome.
    #[must_use]
    pub fn has_event_completed(&self, event_id: &str) -> bool {
        self.shared.has_event_completed(event_id)
    }

    /// Wipes the completion ledger (save wipe / new game).
    pub fn clear_history(&self) {
        self.shared.clear_history();
    }

    /// Registers a collaborator service resolvable from event contexts by
    /// its concrete type.
    pub fn register_service<T>(&self, service: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        self.shared.services.register(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            service,
        );
    }

    /// A standalone flow context, for collaborators that need the same
    /// callback surface events receive.
    #[must_use]
    pub fn context(&self) -> Arc<dyn FlowContext> {
        Arc::new(EventContext::new(Arc::clone(&self.shared)))
    }

    /// Subscribes to lifecycle notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FlowNotification> {
        self.shared.subscribe()
    }

    /// Number of live auxiliary tracks (diagnostics; pruned tracks leave
    /// the count once drained).
    #[must_use]
    pub fn auxiliary_track_count(&self) -> usize {
        self.auxiliaries
            .lock()
            .expect("auxiliary list lock poisoned")
            .len()
    }

    /// The foreground instance currently blocking the main track, as
    /// `(run_id, event_id)`. Background executions are not reported.
    #[must_use]
    pub fn current_main_event(&self) -> Option<(Uuid, String)> {
        self.main
            .current_event()
            .map(|current| (current.run_id, current.event_id))
    }

    /// Number of pending signal waiter entries (diagnostics).
    #[must_use]
    pub fn pending_signal_waits(&self) -> usize {
        self.shared.signals.pending()
    }

    /// Shuts the scheduler down: stops every track loop at its next
    /// suspension point, fails pending signal waits and service resolutions
    /// as cancelled, releases the pause gate, and clears queues and
    /// history. Idempotent and safe to call even if never fully started.
    pub fn shutdown(&self) {
        if !self.shared.cancel.is_cancelled() {
            info!("story flow scheduler shutting down");
        }
        self.shared.cancel.cancel();
        self.shared.resume();
        self.main.clear_queue();
        for track in self
            .auxiliaries
            .lock()
            .expect("auxiliary list lock poisoned")
            .iter()
        {
            track.clear_queue();
        }
        self.shared.clear_history();
    }
}

impl Default for FlowScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FlowScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
