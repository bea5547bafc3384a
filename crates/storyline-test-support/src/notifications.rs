//! Notification helpers for tests.

use std::time::Duration;

use storyline_core::notification::FlowNotification;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const WAIT_DEADLINE: Duration = Duration::from_secs(5);

/// Receives notifications until the `EventFinished` for `event_id` arrives
/// and returns it.
///
/// # Panics
///
/// Panics after five seconds, or when the notification channel closes, so a
/// wedged scheduler fails the test instead of hanging it.
pub async fn wait_for_finished(
    rx: &mut broadcast::Receiver<FlowNotification>,
    event_id: &str,
) -> FlowNotification {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    let finished = matches!(&notification, FlowNotification::EventFinished { .. })
                        && notification.event_id() == Some(event_id);
                    if finished {
                        return notification;
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    panic!("notification channel closed while waiting for {event_id}")
                }
            }
        }
    };
    tokio::time::timeout(WAIT_DEADLINE, wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {event_id} to finish"))
}

/// Drains every notification already delivered, without waiting.
pub fn drain_notifications(
    rx: &mut broadcast::Receiver<FlowNotification>,
) -> Vec<FlowNotification> {
    let mut drained = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(notification) => drained.push(notification),
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return drained,
        }
    }
}
