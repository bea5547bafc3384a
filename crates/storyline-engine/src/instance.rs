//! Queued runtime occurrences of story events.

use std::fmt;
use std::sync::Arc;

use storyline_core::event::{EventState, StoryEvent};
use storyline_core::outcome::Outcome;
use storyline_core::sequence::Sequence;
use uuid::Uuid;

/// Pointer identity of a sequence definition.
///
/// Blocking and restart matching compare authoring objects, never content:
/// two content-identical sequences are distinct. Keys stay valid while any
/// queued or running instance holds the `Arc` they were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SequenceKey(usize);

impl SequenceKey {
    pub(crate) fn of(sequence: &Arc<Sequence>) -> Self {
        Self(Arc::as_ptr(sequence) as usize)
    }
}

/// A queued, stateful occurrence of a story event.
///
/// Created once at enqueue time and never reused; re-enqueueing the same
/// definition produces a fresh instance with a fresh run id.
pub(crate) struct EventInstance {
    run_id: Uuid,
    event: Arc<dyn StoryEvent>,
    source_sequence: Option<Arc<Sequence>>,
    index_in_sequence: usize,
    sequence_length: usize,
    state: EventState,
    last_outcome: Option<Outcome>,
}

impl EventInstance {
    /// Materializes one instance of a sequence member.
    pub(crate) fn in_sequence(
        event: Arc<dyn StoryEvent>,
        source_sequence: Arc<Sequence>,
        index_in_sequence: usize,
        sequence_length: usize,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            event,
            source_sequence: Some(source_sequence),
            index_in_sequence,
            sequence_length,
            state: EventState::Pending,
            last_outcome: None,
        }
    }

    /// Wraps a single event as a one-off instance. With a source sequence
    /// the instance counts as a one-element run of that sequence; without
    /// one it belongs to no sequence at all.
    pub(crate) fn standalone(
        event: Arc<dyn StoryEvent>,
        source_sequence: Option<Arc<Sequence>>,
    ) -> Self {
        let sequence_length = usize::from(source_sequence.is_some());
        Self {
            run_id: Uuid::new_v4(),
            event,
            source_sequence,
            index_in_sequence: 0,
            sequence_length,
            state: EventState::Pending,
            last_outcome: None,
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn event(&self) -> &Arc<dyn StoryEvent> {
        &self.event
    }

    pub(crate) fn source_sequence(&self) -> Option<&Arc<Sequence>> {
        self.source_sequence.as_ref()
    }

    pub(crate) fn sequence_key(&self) -> Option<SequenceKey> {
        self.source_sequence.as_ref().map(SequenceKey::of)
    }

    /// True exactly for the last instance materialized from a sequence.
    pub(crate) fn is_last_in_sequence(&self) -> bool {
        self.sequence_length > 0 && self.index_in_sequence + 1 == self.sequence_length
    }

    pub(crate) fn state(&self) -> EventState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: EventState) {
        self.state = state;
    }

    /// Records the terminal outcome and moves the instance into its state.
    pub(crate) fn finalize(&mut self, outcome: Outcome) {
        self.state = outcome.state;
        self.last_outcome = Some(outcome);
    }

    pub(crate) fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }
}

impl fmt::Debug for EventInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventInstance")
            .field("run_id", &self.run_id)
            .field("event_id", &self.event.event_id())
            .field("index_in_sequence", &self.index_in_sequence)
            .field("sequence_length", &self.sequence_length)
            .field("state", &self.state)
            .finish()
    }
}
