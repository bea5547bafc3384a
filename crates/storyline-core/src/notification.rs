//! Lifecycle notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::EventState;

/// Lifecycle notification broadcast by the engine.
///
/// Collaborators (UI, logging, analytics) subscribe to these; the engine has
/// no knowledge of its subscribers, and a lagging or absent subscriber never
/// affects scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowNotification {
    /// A sequence was materialized onto a track.
    SequenceQueued {
        /// Sequence identifier.
        sequence_id: String,
        /// Number of instances materialized (empty slots excluded).
        event_count: usize,
        /// Label of the receiving track.
        track: String,
        /// Timestamp of enqueue.
        occurred_at: DateTime<Utc>,
    },
    /// One event instance was placed on a track.
    EventQueued {
        /// Instance run id.
        run_id: Uuid,
        /// Event identifier.
        event_id: String,
        /// Label of the receiving track.
        track: String,
        /// Timestamp of enqueue.
        occurred_at: DateTime<Utc>,
    },
    /// An instance started processing.
    EventStarted {
        /// Instance run id.
        run_id: Uuid,
        /// Event identifier.
        event_id: String,
        /// Label of the executing track.
        track: String,
        /// Timestamp of dispatch.
        occurred_at: DateTime<Utc>,
    },
    /// An instance reached a terminal state.
    EventFinished {
        /// Instance run id.
        run_id: Uuid,
        /// Event identifier.
        event_id: String,
        /// Final state of the instance.
        state: EventState,
        /// Outcome message, if any.
        message: Option<String>,
        /// Label of the executing track.
        track: String,
        /// Timestamp of finalization.
        occurred_at: DateTime<Utc>,
    },
    /// An instance's execution returned an error. Emitted in addition to the
    /// `EventFinished` notification that follows.
    EventFailed {
        /// Instance run id.
        run_id: Uuid,
        /// Event identifier.
        event_id: String,
        /// Error message.
        message: String,
        /// Label of the executing track.
        track: String,
        /// Timestamp of the failure.
        occurred_at: DateTime<Utc>,
    },
}

impl FlowNotification {
    /// Returns the event id this notification concerns, when it concerns a
    /// single event.
    #[must_use]
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::SequenceQueued { .. } => None,
            Self::EventQueued { event_id, .. }
            | Self::EventStarted { event_id, .. }
            | Self::EventFinished { event_id, .. }
            | Self::EventFailed { event_id, .. } => Some(event_id),
        }
    }
}
