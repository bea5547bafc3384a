//! Shared test helpers for scheduler integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use storyline_core::event::StoryEvent;
use storyline_core::sequence::Sequence;
use storyline_engine::FlowScheduler;
use storyline_test_support::init_test_tracing;

/// Builds a scheduler with test tracing initialized.
pub fn scheduler() -> FlowScheduler {
    init_test_tracing();
    FlowScheduler::new()
}

/// Builds a sequence from already-built events.
pub fn sequence(id: &str, events: Vec<Arc<dyn StoryEvent>>) -> Arc<Sequence> {
    Arc::new(Sequence::of(id, events))
}

/// Emits `name` until a waiter receives it. Signals are unbuffered, so an
/// emit racing ahead of the waiter would otherwise be lost.
///
/// # Panics
///
/// Panics after five seconds without a waiter.
pub async fn deliver_signal(scheduler: &FlowScheduler, name: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !scheduler.signal(name) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "no waiter appeared for signal {name}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Polls `condition` until it holds.
///
/// # Panics
///
/// Panics after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out: {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
