//! Track — one cooperative FIFO execution loop over event instances.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use storyline_core::error::EngineError;
use storyline_core::event::{EventState, StoryEvent};
use storyline_core::notification::FlowNotification;
use storyline_core::outcome::Outcome;
use storyline_core::sequence::Sequence;
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::EventContext;
use crate::instance::{EventInstance, SequenceKey};
use crate::shared::FlowShared;

/// How a track's loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrackMode {
    /// Runs until the scheduler shuts down.
    Main,
    /// Exits on its own once the queue drains and nothing is in flight.
    Auxiliary,
}

/// Identity of the foreground execution currently blocking a track.
#[derive(Debug, Clone)]
pub(crate) struct CurrentEvent {
    pub(crate) run_id: Uuid,
    pub(crate) event_id: String,
}

/// A single-consumer queue of event instances with its own cooperative loop.
///
/// FIFO modulo two exceptions: explicit front-insertion, and blocked-sequence
/// skip-over (instances from a sequence with an in-flight blocking background
/// event are passed over in place, preserving everyone else's order).
pub(crate) struct Track {
    label: String,
    mode: TrackMode,
    shared: Arc<FlowShared>,
    queue: Mutex<VecDeque<EventInstance>>,
    blocked: Mutex<HashSet<SequenceKey>>,
    current: Mutex<Option<CurrentEvent>>,
    /// Woken on enqueue, sequence unblock, and background completion.
    wake: Notify,
    /// Foreground plus background executions currently running.
    in_flight: AtomicUsize,
}

impl Track {
    pub(crate) fn new(label: impl Into<String>, mode: TrackMode, shared: Arc<FlowShared>) -> Self {
        Self {
            label: label.into(),
            mode,
            shared,
            queue: Mutex::new(VecDeque::new()),
            blocked: Mutex::new(HashSet::new()),
            current: Mutex::new(None),
            wake: Notify::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// The foreground instance currently executing, if any.
    pub(crate) fn current_event(&self) -> Option<CurrentEvent> {
        self.current.lock().expect("track lock poisoned").clone()
    }

    /// Materializes every assigned event of `sequence` into an ordered run
    /// of fresh instances and inserts the run atomically.
    ///
    /// With `insert_at_front` the run keeps its authored order and its first
    /// event lands at the very head of the queue. An empty sequence is a
    /// no-op, not an error. Returns the run ids in authored order.
    pub(crate) fn enqueue_sequence(
        &self,
        sequence: &Arc<Sequence>,
        insert_at_front: bool,
    ) -> Vec<Uuid> {
        let events: Vec<Arc<dyn StoryEvent>> = sequence.events().map(Arc::clone).collect();
        if events.is_empty() {
            debug!(
                track = %self.label,
                sequence_id = sequence.sequence_id(),
                "sequence has no assigned events, nothing to enqueue"
            );
            return Vec::new();
        }

        let length = events.len();
        let instances: Vec<EventInstance> = events
            .into_iter()
            .enumerate()
            .map(|(index, event)| {
                EventInstance::in_sequence(event, Arc::clone(sequence), index, length)
            })
            .collect();
        let run_ids: Vec<Uuid> = instances.iter().map(EventInstance::run_id).collect();

        let now = self.shared.clock.now();
        self.shared.notify(FlowNotification::SequenceQueued {
            sequence_id: sequence.sequence_id().to_owned(),
            event_count: length,
            track: self.label.clone(),
            occurred_at: now,
        });
        for instance in &instances {
            self.shared.notify(FlowNotification::EventQueued {
                run_id: instance.run_id(),
                event_id: instance.event().event_id().to_owned(),
                track: self.label.clone(),
                occurred_at: now,
            });
        }
        debug!(
            track = %self.label,
            sequence_id = sequence.sequence_id(),
            events = length,
            insert_at_front,
            "sequence enqueued"
        );

        self.insert_run(instances, insert_at_front);
        run_ids
    }

    /// Wraps a single event as a one-off instance and queues it.
    pub(crate) fn enqueue_event(
        &self,
        event: Arc<dyn StoryEvent>,
        insert_at_front: bool,
        source_sequence: Option<Arc<Sequence>>,
    ) -> Uuid {
        let instance = EventInstance::standalone(event, source_sequence);
        let run_id = instance.run_id();
        self.shared.notify(FlowNotification::EventQueued {
            run_id,
            event_id: instance.event().event_id().to_owned(),
            track: self.label.clone(),
            occurred_at: self.shared.clock.now(),
        });
        debug!(
            track = %self.label,
            %run_id,
            event_id = instance.event().event_id(),
            insert_at_front,
            "event enqueued"
        );
        self.insert_run(vec![instance], insert_at_front);
        run_id
    }

    /// Removes every still-queued instance of `sequence` (pointer identity),
    /// then enqueues it fresh.
    pub(crate) fn restart_sequence(
        &self,
        sequence: &Arc<Sequence>,
        insert_at_front: bool,
    ) -> Vec<Uuid> {
        let key = SequenceKey::of(sequence);
        let removed = {
            let mut queue = self.queue.lock().expect("track lock poisoned");
            let before = queue.len();
            queue.retain(|instance| instance.sequence_key() != Some(key));
            before - queue.len()
        };
        debug!(
            track = %self.label,
            sequence_id = sequence.sequence_id(),
            removed,
            "sequence restarted"
        );
        self.enqueue_sequence(sequence, insert_at_front)
    }

    /// Drops all queued instances. Never cancels the in-flight foreground
    /// execution.
    pub(crate) fn clear_queue(&self) {
        let dropped = {
            let mut queue = self.queue.lock().expect("track lock poisoned");
            let len = queue.len();
            queue.clear();
            len
        };
        if dropped > 0 {
            debug!(track = %self.label, dropped, "queue cleared");
        }
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.lock().expect("track lock poisoned").len()
    }

    fn insert_run(&self, instances: Vec<EventInstance>, insert_at_front: bool) {
        {
            let mut queue = self.queue.lock().expect("track lock poisoned");
            if insert_at_front {
                for (offset, instance) in instances.into_iter().enumerate() {
                    queue.insert(offset, instance);
                }
            } else {
                queue.extend(instances);
            }
        }
        self.wake.notify_one();
    }

    /// Dequeue-with-skip: removes the first instance whose source sequence
    /// is not currently blocked. Blocked instances stay in place.
    fn next_eligible(&self) -> Option<EventInstance> {
        let blocked = self.blocked.lock().expect("track lock poisoned");
        let mut queue = self.queue.lock().expect("track lock poisoned");
        let position = queue.iter().position(|instance| {
            instance
                .sequence_key()
                .is_none_or(|key| !blocked.contains(&key))
        })?;
        queue.remove(position)
    }

    fn is_drained(&self) -> bool {
        self.queue_len() == 0 && self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Runs the track loop until shutdown (or, for auxiliary tracks, until
    /// drained).
    pub(crate) async fn run(self: Arc<Self>) {
        let mut pause_gate = self.shared.pause_gate();
        debug!(track = %self.label, "track loop started");
        loop {
            if self.shared.cancel.is_cancelled() {
                break;
            }

            // Global pause gate: park until resumed, then re-check.
            if *pause_gate.borrow_and_update() {
                tokio::select! {
                    changed = pause_gate.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = self.shared.cancel.cancelled() => break,
                }
                continue;
            }

            // Register for wakeups before scanning so an enqueue between the
            // scan and the park cannot be missed.
            let woken = self.wake.notified();
            if let Some(instance) = self.next_eligible() {
                self.dispatch(instance).await;
            } else {
                if self.mode == TrackMode::Auxiliary && self.is_drained() {
                    break;
                }
                tokio::select! {
                    () = woken => {}
                    () = self.shared.cancel.cancelled() => break,
                    changed = pause_gate.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        debug!(track = %self.label, "track loop exited");
    }

    /// Launches one dequeued instance: detached for background events,
    /// awaited inline (blocking this track) for foreground events.
    async fn dispatch(self: &Arc<Self>, instance: EventInstance) {
        let background = instance.event().background().unwrap_or_default();
        if background.run_in_background {
            // Block the rest of the source sequence before launching, so no
            // sibling instance can slip past the in-flight event.
            if background.blocks_source_sequence {
                if let Some(key) = instance.sequence_key() {
                    self.blocked
                        .lock()
                        .expect("track lock poisoned")
                        .insert(key);
                }
            }
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let track = Arc::clone(self);
            tokio::spawn(async move {
                track.process_instance(instance).await;
                track.in_flight.fetch_sub(1, Ordering::SeqCst);
                track.wake.notify_one();
            });
        } else {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            *self.current.lock().expect("track lock poisoned") = Some(CurrentEvent {
                run_id: instance.run_id(),
                event_id: instance.event().event_id().to_owned(),
            });
            self.process_instance(instance).await;
            self.current.lock().expect("track lock poisoned").take();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Executes and finalizes one instance. All per-event failures are fully
    /// contained here; nothing escapes to crash the loop or sibling tracks.
    async fn process_instance(self: &Arc<Self>, mut instance: EventInstance) {
        let event = Arc::clone(instance.event());
        let event_id = event.event_id().to_owned();
        let run_id = instance.run_id();

        instance.set_state(EventState::Running);
        self.shared.notify(FlowNotification::EventStarted {
            run_id,
            event_id: event_id.clone(),
            track: self.label.clone(),
            occurred_at: self.shared.clock.now(),
        });
        debug!(track = %self.label, %run_id, event_id = %event_id, "event started");

        let ctx = EventContext::new(Arc::clone(&self.shared));

        // Replay guard: a non-replayable event with a recorded completion is
        // not runnable, and its skip must not overwrite the ledger entry the
        // guard keys on.
        let replay_suppressed =
            !event.replayable() && self.shared.has_event_completed(&event_id);
        let outcome = if replay_suppressed || !event.can_execute(&ctx).await {
            Outcome::skipped("preconditions failed or already complete")
        } else {
            self.execute_event(&event, &ctx, run_id, &event_id).await
        };

        if !event_id.is_empty() && !replay_suppressed {
            self.shared.record_outcome(&event_id, &outcome);
        }

        // Explicit chain override wins; otherwise the source sequence
        // auto-chains off its last instance, on success or skip only.
        if let Some(next) = &outcome.next_sequence {
            self.enqueue_sequence(next, false);
        } else if instance.is_last_in_sequence()
            && matches!(outcome.state, EventState::Completed | EventState::Skipped)
        {
            let chained = instance
                .source_sequence()
                .and_then(|sequence| sequence.next_sequence())
                .map(Arc::clone);
            if let Some(next) = chained {
                debug!(
                    track = %self.label,
                    sequence_id = next.sequence_id(),
                    "auto-chaining follow-up sequence"
                );
                self.enqueue_sequence(&next, false);
            }
        }

        if outcome.pause_flow {
            instance.set_state(EventState::Waiting);
            self.shared.pause("outcome requested flow pause");
        }

        instance.finalize(outcome);
        let (state, message) = instance
            .last_outcome()
            .map_or((EventState::Completed, None), |outcome| {
                (outcome.state, outcome.message.clone())
            });
        self.shared.notify(FlowNotification::EventFinished {
            run_id,
            event_id: event_id.clone(),
            state,
            message,
            track: self.label.clone(),
            occurred_at: self.shared.clock.now(),
        });
        debug!(
            track = %self.label,
            %run_id,
            event_id = %event_id,
            state = ?instance.state(),
            "event finished"
        );

        // A blocking background instance releases its sequence only now that
        // it is fully finalized.
        if event
            .background()
            .is_some_and(|config| config.run_in_background && config.blocks_source_sequence)
        {
            if let Some(key) = instance.sequence_key() {
                self.blocked
                    .lock()
                    .expect("track lock poisoned")
                    .remove(&key);
                self.wake.notify_one();
            }
        }
    }

    /// Runs `execute` with a child cancellation token, normalizing the
    /// result to a terminal outcome.
    async fn execute_event(
        &self,
        event: &Arc<dyn StoryEvent>,
        ctx: &EventContext,
        run_id: Uuid,
        event_id: &str,
    ) -> Outcome {
        let cancel = self.shared.cancel.child_token();
        let result = tokio::select! {
            result = event.execute(ctx, cancel.clone()) => result,
            () = self.shared.cancel.cancelled() => Err(EngineError::Cancelled),
        };
        match result {
            Ok(mut outcome) => {
                // An event must never leave an instance non-terminal.
                if !outcome.state.is_terminal() {
                    outcome.state = EventState::Completed;
                }
                outcome
            }
            Err(EngineError::Cancelled) => Outcome::cancelled("execution cancelled"),
            Err(error) => {
                let message = error.to_string();
                warn!(
                    track = %self.label,
                    %run_id,
                    event_id = %event_id,
                    error = %message,
                    "event execution failed"
                );
                self.shared.notify(FlowNotification::EventFailed {
                    run_id,
                    event_id: event_id.to_owned(),
                    message: message.clone(),
                    track: self.label.clone(),
                    occurred_at: self.shared.clock.now(),
                });
                Outcome::failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use storyline_core::clock::SystemClock;
    use storyline_test_support::ScriptedEvent;

    use super::*;

    fn test_track() -> Track {
        Track::new(
            "main",
            TrackMode::Main,
            Arc::new(FlowShared::new(Arc::new(SystemClock))),
        )
    }

    fn two_event_sequence(id: &str) -> Arc<Sequence> {
        Arc::new(Sequence::of(
            id,
            vec![
                ScriptedEvent::new(format!("{id}.a")).into_event(),
                ScriptedEvent::new(format!("{id}.b")).into_event(),
            ],
        ))
    }

    #[test]
    fn test_enqueue_sequence_materializes_assigned_events_only() {
        // Arrange
        let track = test_track();
        let sequence = Arc::new(Sequence::new(
            "gaps",
            vec![
                Some(ScriptedEvent::new("a").into_event()),
                None,
                Some(ScriptedEvent::new("b").into_event()),
            ],
        ));

        // Act
        let run_ids = track.enqueue_sequence(&sequence, false);

        // Assert
        assert_eq!(run_ids.len(), 2);
        assert_eq!(track.queue_len(), 2);
    }

    #[test]
    fn test_enqueue_empty_sequence_is_noop() {
        // Arrange
        let track = test_track();
        let sequence = Arc::new(Sequence::new("empty", vec![None, None]));

        // Act
        let run_ids = track.enqueue_sequence(&sequence, false);

        // Assert
        assert!(run_ids.is_empty());
        assert_eq!(track.queue_len(), 0);
    }

    #[test]
    fn test_front_insertion_keeps_run_order_with_head_first() {
        // Arrange
        let track = test_track();
        let first = two_event_sequence("first");
        let second = two_event_sequence("second");
        track.enqueue_sequence(&first, false);

        // Act
        track.enqueue_sequence(&second, true);

        // Assert: second fully precedes first, in authored order.
        let queue = track.queue.lock().expect("track lock poisoned");
        let ids: Vec<String> = queue
            .iter()
            .map(|instance| instance.event().event_id().to_owned())
            .collect();
        assert_eq!(ids, vec!["second.a", "second.b", "first.a", "first.b"]);
    }

    #[test]
    fn test_restart_sequence_removes_only_matching_instances() {
        // Arrange
        let track = test_track();
        let restarted = two_event_sequence("restarted");
        let bystander = two_event_sequence("bystander");
        track.enqueue_sequence(&restarted, false);
        track.enqueue_sequence(&bystander, false);

        // Act
        track.restart_sequence(&restarted, false);

        // Assert: bystander untouched, restarted run re-queued at the back.
        let queue = track.queue.lock().expect("track lock poisoned");
        let ids: Vec<String> = queue
            .iter()
            .map(|instance| instance.event().event_id().to_owned())
            .collect();
        assert_eq!(
            ids,
            vec!["bystander.a", "bystander.b", "restarted.a", "restarted.b"]
        );
    }

    #[test]
    fn test_restart_matches_pointer_identity_not_content() {
        // Arrange: two content-identical sequence objects.
        let track = test_track();
        let original = two_event_sequence("twin");
        let twin = two_event_sequence("twin");
        track.enqueue_sequence(&original, false);

        // Act: restarting the twin must not remove the original's instances.
        track.restart_sequence(&twin, false);

        // Assert
        assert_eq!(track.queue_len(), 4);
    }

    #[test]
    fn test_blocked_sequence_is_passed_over_in_place() {
        // Arrange
        let track = test_track();
        let blocked_seq = two_event_sequence("blocked");
        let other = two_event_sequence("other");
        track.enqueue_sequence(&blocked_seq, false);
        track.enqueue_sequence(&other, false);
        track
            .blocked
            .lock()
            .expect("track lock poisoned")
            .insert(SequenceKey::of(&blocked_seq));

        // Act
        let first = track.next_eligible().expect("an eligible instance");
        let second = track.next_eligible().expect("an eligible instance");

        // Assert: the blocked run is skipped over but left in the queue.
        assert_eq!(first.event().event_id(), "other.a");
        assert_eq!(second.event().event_id(), "other.b");
        assert!(track.next_eligible().is_none());
        assert_eq!(track.queue_len(), 2);

        // Unblocking restores the original order of the remainder.
        track
            .blocked
            .lock()
            .expect("track lock poisoned")
            .clear();
        let third = track.next_eligible().expect("an eligible instance");
        assert_eq!(third.event().event_id(), "blocked.a");
    }

    #[test]
    fn test_clear_queue_drops_everything() {
        // Arrange
        let track = test_track();
        track.enqueue_sequence(&two_event_sequence("doomed"), false);

        // Act
        track.clear_queue();

        // Assert
        assert_eq!(track.queue_len(), 0);
    }
}
