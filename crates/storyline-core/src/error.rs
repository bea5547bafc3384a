//! Engine error types.

use thiserror::Error;

/// Top-level engine error type.
///
/// Per-event failures never propagate out of a track loop: an `Err` returned
/// from [`crate::event::StoryEvent::execute`] is contained at the track
/// boundary and converted into a `Failed` (or `Cancelled`) outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The execution or wait was cancelled (orderly shutdown/interruption).
    #[error("execution cancelled")]
    Cancelled,

    /// An event's execution body failed.
    #[error("execution error: {0}")]
    Execution(String),

    /// A required collaborator service never became available.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The scheduler has been shut down and accepts no further work.
    #[error("scheduler is shut down")]
    Shutdown,
}
