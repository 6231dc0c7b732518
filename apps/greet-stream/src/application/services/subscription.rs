//! Subscription Service
//!
//! Drives a stream call through its lifecycle:
//!
//! ```text
//! Init ──register──► Registered ──► Streaming ──┬─► Cancelled ──┬─► Unregistered
//!   │                                           └─► Closed ─────┘
//!   └─► (closed: rejected)
//! ```
//!
//! The response stream reads straight from the subscriber queue, so that
//! queue is the only buffer between `submit` and the transport. Dropping
//! the stream drops the `Subscription` guard, which unregisters it on every
//! exit path, unwinding included.

use futures::{Stream, stream};

use super::StreamError;
use crate::infrastructure::broadcast::{SharedBroadcaster, Subscription};

/// Terminal state of a stream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The broadcaster closed; the stream ended cleanly.
    Closed,
    /// The stream was dropped before the broadcaster closed.
    ///
    /// The caller leaving and a failed write look the same from here: the
    /// transport drops the response stream in both cases.
    Cancelled,
}

impl StreamOutcome {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Registers stream callers and turns their subscriptions into streams.
#[derive(Debug, Clone)]
pub struct SubscriptionService {
    broadcaster: SharedBroadcaster<String>,
}

impl SubscriptionService {
    /// Create a subscription service over `broadcaster`.
    #[must_use]
    pub const fn new(broadcaster: SharedBroadcaster<String>) -> Self {
        Self { broadcaster }
    }

    /// Register a new subscriber for a stream call.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Closed` if the broadcaster has been closed.
    pub fn open(&self) -> Result<Subscription<String>, StreamError> {
        Ok(self.broadcaster.subscribe()?)
    }

    /// Turn `subscription` into the values of one stream call.
    ///
    /// Each poll waits for the next delivered value; nothing is read ahead.
    /// The stream ends once the broadcaster closes and the queue is
    /// drained. `on_finish` runs exactly once, after the subscription is
    /// unregistered, when the stream ends or is dropped.
    pub fn stream<F>(
        subscription: Subscription<String>,
        on_finish: F,
    ) -> impl Stream<Item = String> + Send + 'static
    where
        F: FnOnce(StreamOutcome) + Send + 'static,
    {
        let forwarding = Forwarding {
            subscription: Some(subscription),
            outcome: StreamOutcome::Cancelled,
            on_finish: Some(on_finish),
        };

        stream::unfold(forwarding, |mut state| async move {
            let name = state.next().await?;
            Some((name, state))
        })
    }
}

/// State behind one stream call; reports its outcome when dropped.
struct Forwarding<F: FnOnce(StreamOutcome)> {
    subscription: Option<Subscription<String>>,
    outcome: StreamOutcome,
    on_finish: Option<F>,
}

impl<F: FnOnce(StreamOutcome)> Forwarding<F> {
    async fn next(&mut self) -> Option<String> {
        let name = match self.subscription.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => None,
        };
        if name.is_none() {
            self.outcome = StreamOutcome::Closed;
        }
        name
    }
}

impl<F: FnOnce(StreamOutcome)> Drop for Forwarding<F> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            tracing::debug!(
                subscriber_id = subscription.id(),
                outcome = self.outcome.as_str(),
                dropped = subscription.dropped(),
                "Stream forwarding finished"
            );
        }
        if let Some(on_finish) = self.on_finish.take() {
            on_finish(self.outcome);
        }
    }
}
