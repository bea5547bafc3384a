//! Execution outcomes.

use std::sync::Arc;

use crate::event::EventState;
use crate::sequence::Sequence;

/// Terminal result of one event instance's execution.
///
/// Carries the final state, an optional human-readable message, an optional
/// explicit follow-up sequence (overrides the source sequence's auto-chain),
/// and a flag asking the scheduler to pause the whole flow.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Final lifecycle state. Non-terminal states returned by an event are
    /// normalized to `Completed` by the owning track before recording.
    pub state: EventState,
    /// Optional message (skip reason, failure detail, flavor text).
    pub message: Option<String>,
    /// Explicit follow-up sequence to enqueue, overriding auto-chaining.
    pub next_sequence: Option<Arc<Sequence>>,
    /// When set, the scheduler pauses every track after this instance
    /// finalizes.
    pub pause_flow: bool,
}

impl Outcome {
    fn with_state(state: EventState) -> Self {
        Self {
            state,
            message: None,
            next_sequence: None,
            pause_flow: false,
        }
    }

    /// A successful completion.
    #[must_use]
    pub fn completed() -> Self {
        Self::with_state(EventState::Completed)
    }

    /// A skip (precondition failed or replay suppressed). Expected control
    /// flow, not an error.
    #[must_use]
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::with_state(EventState::Skipped)
        }
    }

    /// A contained execution failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::with_state(EventState::Failed)
        }
    }

    /// An orderly interruption.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::with_state(EventState::Cancelled)
        }
    }

    /// Attaches a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Requests an explicit follow-up sequence, overriding auto-chaining.
    #[must_use]
    pub fn with_next_sequence(mut self, next: Arc<Sequence>) -> Self {
        self.next_sequence = Some(next);
        self
    }

    /// Requests a global flow pause once this instance finalizes.
    #[must_use]
    pub fn with_pause_flow(mut self) -> Self {
        self.pause_flow = true;
        self
    }
}
