//! Test events — scripted `StoryEvent` implementations for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storyline_core::context::FlowContext;
use storyline_core::error::EngineError;
use storyline_core::event::{BackgroundConfig, StoryEvent};
use storyline_core::outcome::Outcome;
use tokio_util::sync::CancellationToken;

/// Shared, ordered record of which events executed.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    entries: Mutex<Vec<String>>,
}

impl ExecutionLog {
    /// Creates a fresh shared log.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends an entry.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn record(&self, entry: &str) {
        self.entries.lock().unwrap().push(entry.to_owned());
    }

    /// Returns a snapshot of all entries in execution order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

/// A configurable story event for tests: scripted id, replayability,
/// background capability, precondition result, and outcome, with an
/// execution counter and optional hold-until-signal suspension.
pub struct ScriptedEvent {
    event_id: String,
    replayable: bool,
    background: Option<BackgroundConfig>,
    runnable: bool,
    outcome: Outcome,
    hold_signal: Option<String>,
    log: Option<Arc<ExecutionLog>>,
    executions: AtomicUsize,
}

impl ScriptedEvent {
    /// A replayable foreground event that completes immediately.
    #[must_use]
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            replayable: true,
            background: None,
            runnable: true,
            outcome: Outcome::completed(),
            hold_signal: None,
            log: None,
            executions: AtomicUsize::new(0),
        }
    }

    /// Marks the event non-replayable (one recorded completion suppresses
    /// all later executions).
    #[must_use]
    pub fn not_replayable(mut self) -> Self {
        self.replayable = false;
        self
    }

    /// Gives the event background capability.
    #[must_use]
    pub fn in_background(mut self, blocks_source_sequence: bool) -> Self {
        self.background = Some(BackgroundConfig {
            run_in_background: true,
            blocks_source_sequence,
        });
        self
    }

    /// Makes `can_execute` report false.
    #[must_use]
    pub fn refusing_preconditions(mut self) -> Self {
        self.runnable = false;
        self
    }

    /// Scripts the outcome returned by `execute`.
    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Makes `execute` suspend until the named signal is emitted.
    #[must_use]
    pub fn holding_until(mut self, signal: impl Into<String>) -> Self {
        self.hold_signal = Some(signal.into());
        self
    }

    /// Records each execution in the shared log, in order.
    #[must_use]
    pub fn logging_to(mut self, log: &Arc<ExecutionLog>) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    /// Number of times `execute` has been invoked.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Finishes the builder as an `Arc<dyn StoryEvent>`, discarding the
    /// typed handle. Keep an `Arc<ScriptedEvent>` instead when the test
    /// needs [`Self::execution_count`].
    #[must_use]
    pub fn into_event(self) -> Arc<dyn StoryEvent> {
        Arc::new(self)
    }
}

#[async_trait]
impl StoryEvent for ScriptedEvent {
    fn event_id(&self) -> &str {
        &self.event_id
    }

    fn replayable(&self) -> bool {
        self.replayable
    }

    fn background(&self) -> Option<BackgroundConfig> {
        self.background
    }

    async fn can_execute(&self, _ctx: &dyn FlowContext) -> bool {
        self.runnable
    }

    async fn execute(
        &self,
        ctx: &dyn FlowContext,
        cancel: CancellationToken,
    ) -> Result<Outcome, EngineError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.record(&self.event_id);
        }
        if let Some(signal) = &self.hold_signal {
            tokio::select! {
                result = ctx.wait_for_signal(signal) => result?,
                () = cancel.cancelled() => return Err(EngineError::Cancelled),
            }
        }
        Ok(self.outcome.clone())
    }
}

/// A story event whose execution always fails with the configured message.
pub struct FailingEvent {
    event_id: String,
    message: String,
}

impl FailingEvent {
    /// Creates a failing event.
    #[must_use]
    pub fn new(event_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            message: message.into(),
        }
    }

    /// Finishes the builder as an `Arc<dyn StoryEvent>`.
    #[must_use]
    pub fn into_event(self) -> Arc<dyn StoryEvent> {
        Arc::new(self)
    }
}

#[async_trait]
impl StoryEvent for FailingEvent {
    fn event_id(&self) -> &str {
        &self.event_id
    }

    async fn execute(
        &self,
        _ctx: &dyn FlowContext,
        _cancel: CancellationToken,
    ) -> Result<Outcome, EngineError> {
        Err(EngineError::Execution(self.message.clone()))
    }
}
