//! Story sequence definitions.

use std::fmt;
use std::sync::Arc;

use crate::event::StoryEvent;

/// Ordered, immutable list of story events with an optional auto-chained
/// follow-up.
///
/// Authoring tools may leave gaps (`None` slots); the engine filters them
/// out at materialization time. Sequence identity is `Arc` pointer identity:
/// two content-identical sequences are distinct authoring objects, and
/// blocking/restart matching never compares content.
pub struct Sequence {
    sequence_id: String,
    events: Vec<Option<Arc<dyn StoryEvent>>>,
    next_sequence: Option<Arc<Sequence>>,
}

impl Sequence {
    /// Creates a sequence from authored event slots.
    #[must_use]
    pub fn new(sequence_id: impl Into<String>, events: Vec<Option<Arc<dyn StoryEvent>>>) -> Self {
        Self {
            sequence_id: sequence_id.into(),
            events,
            next_sequence: None,
        }
    }

    /// Convenience constructor for fully populated sequences.
    #[must_use]
    pub fn of(sequence_id: impl Into<String>, events: Vec<Arc<dyn StoryEvent>>) -> Self {
        Self::new(sequence_id, events.into_iter().map(Some).collect())
    }

    /// Sets the sequence to auto-chain when this one's last event completes
    /// or is skipped.
    #[must_use]
    pub fn with_next(mut self, next: Arc<Sequence>) -> Self {
        self.next_sequence = Some(next);
        self
    }

    /// Returns the sequence identifier.
    #[must_use]
    pub fn sequence_id(&self) -> &str {
        &self.sequence_id
    }

    /// Iterates the assigned events in authored order, skipping empty slots.
    ///
    /// Restartable: every call walks the same live definitions.
    pub fn events(&self) -> impl Iterator<Item = &Arc<dyn StoryEvent>> {
        self.events.iter().filter_map(Option::as_ref)
    }

    /// Number of assigned (non-empty) event slots.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events().count()
    }

    /// Returns the auto-chained follow-up sequence, if any.
    #[must_use]
    pub fn next_sequence(&self) -> Option<&Arc<Sequence>> {
        self.next_sequence.as_ref()
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("sequence_id", &self.sequence_id)
            .field("slots", &self.events.len())
            .field("events", &self.event_count())
            .field("has_next", &self.next_sequence.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::context::FlowContext;
    use crate::error::EngineError;
    use crate::outcome::Outcome;

    struct NamedEvent(&'static str);

    #[async_trait]
    impl StoryEvent for NamedEvent {
        fn event_id(&self) -> &str {
            self.0
        }

        async fn execute(
            &self,
            _ctx: &dyn FlowContext,
            _cancel: CancellationToken,
        ) -> Result<Outcome, EngineError> {
            Ok(Outcome::completed())
        }
    }

    #[test]
    fn test_events_filters_empty_slots() {
        // Arrange
        let sequence = Sequence::new(
            "intro",
            vec![
                Some(Arc::new(NamedEvent("a")) as Arc<dyn StoryEvent>),
                None,
                Some(Arc::new(NamedEvent("b")) as Arc<dyn StoryEvent>),
                None,
            ],
        );

        // Act
        let ids: Vec<&str> = sequence.events().map(|e| e.event_id()).collect();

        // Assert
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(sequence.event_count(), 2);
    }

    #[test]
    fn test_events_is_restartable() {
        // Arrange
        let sequence = Sequence::of(
            "intro",
            vec![Arc::new(NamedEvent("a")) as Arc<dyn StoryEvent>],
        );

        // Act
        let first: Vec<&str> = sequence.events().map(|e| e.event_id()).collect();
        let second: Vec<&str> = sequence.events().map(|e| e.event_id()).collect();

        // Assert
        assert_eq!(first, second);
    }
}
