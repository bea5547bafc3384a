//! Story event abstractions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::context::FlowContext;
use crate::error::EngineError;
use crate::outcome::Outcome;

/// Lifecycle state of a queued event instance.
///
/// An instance moves strictly `Pending → Running → {Completed | Skipped |
/// Failed | Cancelled}`. `Waiting` is the one permitted excursion: an
/// instance whose outcome requests a flow pause passes through it between
/// `Running` and its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    /// Queued, not yet dispatched.
    Pending,
    /// Suspended while a requested flow pause takes effect.
    Waiting,
    /// Execution in progress.
    Running,
    /// Execution finished successfully.
    Completed,
    /// Precondition failed or replay was suppressed; `execute` never ran.
    Skipped,
    /// Execution returned an error.
    Failed,
    /// Execution was interrupted by cancellation.
    Cancelled,
}

impl EventState {
    /// Returns `true` for the four terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Skipped | Self::Failed | Self::Cancelled
        )
    }
}

/// Background capability record for an event definition.
///
/// Replaces the duck-typed capability probe of older engines with an explicit
/// optional record: an event either carries this configuration or it is a
/// plain foreground event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackgroundConfig {
    /// The owning track launches this event without awaiting it.
    pub run_in_background: bool,
    /// While this event runs, remaining queued instances from the same
    /// source sequence are passed over until it finishes.
    pub blocks_source_sequence: bool,
}

/// Immutable definition of one executable unit of story content.
///
/// Definitions are authored externally, handed to the engine behind
/// `Arc<dyn StoryEvent>`, and never mutated or dropped by the engine. Each
/// time a definition is enqueued, the engine materializes a fresh runtime
/// instance around it.
#[async_trait]
pub trait StoryEvent: Send + Sync {
    /// Stable identifier for this event.
    ///
    /// Used as the key of the global completion ledger; an empty id is legal
    /// but excluded from history (the event then has no replay guard).
    fn event_id(&self) -> &str;

    /// Whether this event may execute again after a recorded completion.
    ///
    /// When `false`, a `Completed` outcome recorded for [`Self::event_id`]
    /// causes every later scheduling attempt to resolve as `Skipped` without
    /// invoking [`Self::execute`].
    fn replayable(&self) -> bool {
        true
    }

    /// Optional background capability. `None` means plain foreground.
    fn background(&self) -> Option<BackgroundConfig> {
        None
    }

    /// Precondition check, evaluated immediately before execution.
    ///
    /// Must be side-effect-free or idempotent: the engine may evaluate it
    /// more than once before [`Self::execute`] runs.
    async fn can_execute(&self, ctx: &dyn FlowContext) -> bool {
        let _ = ctx;
        true
    }

    /// Executes the event. The only place side effects should occur.
    ///
    /// May suspend arbitrarily long (waiting for a player action, a timer, a
    /// signal). Must observe `cancel` promptly; a cancelled execution
    /// resolves to a `Cancelled` outcome, never to a dangling instance.
    ///
    /// # Errors
    ///
    /// `Err(EngineError::Cancelled)` is reported as a `Cancelled` outcome;
    /// any other error is contained by the owning track and reported as a
    /// `Failed` outcome with the error message.
    async fn execute(
        &self,
        ctx: &dyn FlowContext,
        cancel: CancellationToken,
    ) -> Result<Outcome, EngineError>;
}
