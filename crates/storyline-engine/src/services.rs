//! Collaborator service registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use storyline_core::error::EngineError;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capability-typed map of external collaborator services.
///
/// Events resolve collaborators (an order system, a quest system) by type
/// without the engine depending on their concrete implementations. A resolve
/// call waits until the capability is registered; registration order is
/// therefore free.
#[derive(Default)]
pub(crate) struct ServiceRegistry {
    services: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    registered: Notify,
}

impl ServiceRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the service for `capability`.
    pub(crate) fn register(
        &self,
        capability: TypeId,
        capability_name: &'static str,
        service: Arc<dyn Any + Send + Sync>,
    ) {
        self.services
            .lock()
            .expect("service registry lock poisoned")
            .insert(capability, service);
        debug!(capability = capability_name, "service registered");
        self.registered.notify_waiters();
    }

    /// Resolves the service for `capability`, waiting until one is
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ServiceUnavailable` when `cancel` fires before
    /// a registration arrives. The failure surfaces only to the awaiting
    /// caller; the rest of the system keeps running.
    pub(crate) async fn resolve(
        &self,
        capability: TypeId,
        capability_name: &'static str,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn Any + Send + Sync>, EngineError> {
        loop {
            let registered = self.registered.notified();
            let found = self
                .services
                .lock()
                .expect("service registry lock poisoned")
                .get(&capability)
                .cloned();
            if let Some(service) = found {
                return Ok(service);
            }
            tokio::select! {
                () = registered => {}
                () = cancel.cancelled() => {
                    return Err(EngineError::ServiceUnavailable(format!(
                        "{capability_name} never registered before shutdown"
                    )));
                }
            }
        }
    }
}
