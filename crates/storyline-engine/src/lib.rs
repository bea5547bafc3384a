//! Storyline Engine — the event-track scheduler runtime.
//!
//! A [`scheduler::FlowScheduler`] owns one main track plus dynamically
//! created auxiliary tracks. Each track is a cooperative FIFO loop over
//! queued event instances: it dequeues the next eligible instance, checks
//! its precondition, executes it, and finalizes the outcome (history
//! recording, auto-chaining, pause requests, notifications). Events may run
//! in the background relative to their track and may block the remainder of
//! their source sequence while they do.

mod context;
mod instance;
mod services;
mod shared;
mod signal;
mod track;

pub mod scheduler;

pub use scheduler::FlowScheduler;
