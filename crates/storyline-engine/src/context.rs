//! The engine's `FlowContext` implementation.

use std::any::{Any, TypeId};
use std::sync::Arc;

use async_trait::async_trait;
use storyline_core::context::FlowContext;
use storyline_core::error::EngineError;
use storyline_core::outcome::Outcome;

use crate::shared::FlowShared;

/// Execution context handed to every `can_execute`/`execute` call.
///
/// A thin handle over the scheduler's shared state: signal rendezvous,
/// history queries, and service resolution — the only coupling an event has
/// to the rest of the engine.
pub(crate) struct EventContext {
    shared: Arc<FlowShared>,
}

impl EventContext {
    pub(crate) fn new(shared: Arc<FlowShared>) -> Self {
        Self { shared }
    }
}

#[async_trait]
impl FlowContext for EventContext {
    async fn wait_for_signal(&self, signal_id: &str) -> Result<(), EngineError> {
        self.shared
            .signals
            .wait(signal_id, &self.shared.cancel)
            .await
    }

    fn emit_signal(&self, signal_id: &str) -> bool {
        self.shared.signals.signal(signal_id)
    }

    fn story_event_result(&self, event_id: &str) -> Option<Outcome> {
        self.shared.story_event_result(event_id)
    }

    fn has_event_completed(&self, event_id: &str) -> bool {
        self.shared.has_event_completed(event_id)
    }

    async fn resolve_service_raw(
        &self,
        capability: TypeId,
        capability_name: &'static str,
    ) -> Result<Arc<dyn Any + Send + Sync>, EngineError> {
        self.shared
            .services
            .resolve(capability, capability_name, &self.shared.cancel)
            .await
    }
}
