//! Shared test doubles and utilities for the Storyline engine.

mod clock;
mod events;
mod logging;
mod notifications;

pub use clock::FixedClock;
pub use events::{ExecutionLog, FailingEvent, ScriptedEvent};
pub use logging::init_test_tracing;
pub use notifications::{drain_notifications, wait_for_finished};
