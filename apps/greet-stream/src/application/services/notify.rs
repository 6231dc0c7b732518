//! Notify Service
//!
//! Hands a name to the broadcaster and answers with a greeting. Delivery is
//! a side effect: its outcome is logged and reported separately from the
//! greeting, never as a failure of the call.

use crate::domain::greeting::greeting_for;
use crate::infrastructure::broadcast::{Delivery, SharedBroadcaster};
use crate::infrastructure::metrics;

/// Result of a notify call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Greeting returned to the caller.
    pub greeting: String,
    /// Fan-out outcome, `None` when the broadcaster was closed.
    pub delivery: Option<Delivery>,
}

/// Best-effort notification publisher.
#[derive(Debug, Clone)]
pub struct NotifyService {
    broadcaster: SharedBroadcaster<String>,
}

impl NotifyService {
    /// Create a notify service publishing to `broadcaster`.
    #[must_use]
    pub const fn new(broadcaster: SharedBroadcaster<String>) -> Self {
        Self { broadcaster }
    }

    /// Publish `name` to every listener and build the greeting.
    #[must_use]
    pub fn notify(&self, name: &str) -> Notification {
        Notification {
            greeting: greeting_for(name),
            delivery: self.publish(name),
        }
    }

    fn publish(&self, name: &str) -> Option<Delivery> {
        match self.broadcaster.submit(name.to_string()) {
            Ok(delivery) => {
                metrics::record_notification(delivery);
                if delivery.dropped > 0 {
                    tracing::warn!(
                        delivered = delivery.delivered,
                        dropped = delivery.dropped,
                        "Notification dropped for slow subscribers"
                    );
                } else {
                    tracing::debug!(delivered = delivery.delivered, "Notification published");
                }
                Some(delivery)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Notification discarded");
                None
            }
        }
    }
}
