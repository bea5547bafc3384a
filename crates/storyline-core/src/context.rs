//! Flow context — the callback surface events see.

use std::any::{Any, TypeId};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::outcome::Outcome;

/// The narrow contract through which an executing event calls back into the
/// scheduler.
///
/// This is the event's only coupling to the rest of the engine: signal
/// rendezvous, read-only history queries, and asynchronous resolution of
/// named collaborator services by capability type.
#[async_trait]
pub trait FlowContext: Send + Sync {
    /// Blocks until `signal_id` is emitted or the scheduler shuts down.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Cancelled` when the scheduler shuts down while
    /// the wait is pending.
    async fn wait_for_signal(&self, signal_id: &str) -> Result<(), EngineError>;

    /// Emits `signal_id`, waking any pending waiter. Returns whether a
    /// waiter existed. An emit with no waiter is lost, not buffered.
    fn emit_signal(&self, signal_id: &str) -> bool;

    /// Returns the last recorded outcome for `event_id`, if any.
    fn story_event_result(&self, event_id: &str) -> Option<Outcome>;

    /// Returns whether `event_id` has a recorded `Completed` outcome.
    fn has_event_completed(&self, event_id: &str) -> bool;

    /// Resolves a collaborator service by capability type id, waiting until
    /// one is registered. `capability_name` is used for diagnostics only.
    ///
    /// Prefer the typed [`resolve_service`] helper.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ServiceUnavailable` when the scheduler shuts
    /// down before the service is registered.
    async fn resolve_service_raw(
        &self,
        capability: TypeId,
        capability_name: &'static str,
    ) -> Result<Arc<dyn Any + Send + Sync>, EngineError>;
}

/// Resolves a collaborator service of concrete type `T` from the context.
///
/// # Errors
///
/// Returns `EngineError::ServiceUnavailable` when the scheduler shuts down
/// before a `T` is registered, or when the registered value is not a `T`.
pub async fn resolve_service<T>(ctx: &dyn FlowContext) -> Result<Arc<T>, EngineError>
where
    T: Any + Send + Sync,
{
    let name = std::any::type_name::<T>();
    let raw = ctx.resolve_service_raw(TypeId::of::<T>(), name).await?;
    raw.downcast::<T>().map_err(|_| {
        EngineError::ServiceUnavailable(format!("service registered for {name} has a different type"))
    })
}
