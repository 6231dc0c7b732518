//! Broadcast Hub
//!
//! Fans every submitted value out to each registered subscriber through a
//! bounded per-subscriber queue.
//!
//! # Architecture
//!
//! The `Broadcaster` owns the sending half of one bounded `mpsc` queue per
//! subscriber, keyed by `SubscriberId`. A `Subscriber` holds the id and the
//! receiving half, so the only state shared between calls is the
//! broadcaster itself.
//!
//! # Backpressure
//!
//! `submit` never waits on a slow subscriber. When a subscriber's queue is
//! full the new value is dropped for that subscriber only, and the drop is
//! counted both on the subscriber and in the hub totals. Values that do get
//! queued keep their submission order.
//!
//! # Lifecycle
//!
//! `close` rejects further registrations and releases every queue sender,
//! so each subscriber drains what is already buffered and then observes
//! end-of-stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::BroadcastSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a registered subscriber.
pub type SubscriberId = u64;

/// Broadcast hub errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// The hub has been closed.
    #[error("broadcaster is closed")]
    Closed,
}

/// Outcome of a single `submit` across the subscriber snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers that had room for the value.
    pub delivered: usize,
    /// Subscribers whose queue was full.
    pub dropped: usize,
}

/// Configuration for the broadcast hub.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Capacity of each subscriber's queue.
    pub subscriber_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 10,
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            subscriber_capacity: settings.subscriber_capacity,
        }
    }
}

/// Statistics about the broadcast hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Currently registered subscribers.
    pub subscribers: usize,
    /// Values accepted by `submit`.
    pub submitted: u64,
    /// Individual per-subscriber deliveries.
    pub delivered: u64,
    /// Individual per-subscriber drops.
    pub dropped: u64,
    /// Whether the hub has been closed.
    pub closed: bool,
}

// =============================================================================
// Broadcaster
// =============================================================================

struct Slot<T> {
    tx: mpsc::Sender<T>,
    dropped: Arc<AtomicU64>,
}

struct Registry<T> {
    subscribers: HashMap<SubscriberId, Slot<T>>,
    closed: bool,
}

/// Fan-out hub with a bounded queue per subscriber.
///
/// # Example
///
/// ```rust
/// use greet_stream::infrastructure::broadcast::{BroadcastConfig, Broadcaster};
///
/// # tokio_test::block_on(async {
/// let hub = Broadcaster::<String>::new(BroadcastConfig::default());
/// let mut subscriber = hub.register().unwrap();
///
/// hub.submit("Ada".to_string()).unwrap();
/// assert_eq!(subscriber.recv().await.as_deref(), Some("Ada"));
///
/// hub.unregister(subscriber.id());
/// # });
/// ```
pub struct Broadcaster<T> {
    capacity: usize,
    registry: RwLock<Registry<T>>,
    next_id: AtomicU64,
    submitted: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl<T: Clone> Broadcaster<T> {
    /// Create a new broadcaster with the given configuration.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            capacity: config.subscriber_capacity.max(1),
            registry: RwLock::new(Registry {
                subscribers: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
            submitted: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a new broadcaster with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Register a fresh subscriber with its own empty queue.
    ///
    /// The subscriber sees every value submitted after this returns.
    ///
    /// # Errors
    ///
    /// Returns `BroadcastError::Closed` once `close` has been called.
    pub fn register(&self) -> Result<Subscriber<T>, BroadcastError> {
        let mut registry = self.registry.write();
        if registry.closed {
            return Err(BroadcastError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        registry.subscribers.insert(
            id,
            Slot {
                tx,
                dropped: Arc::clone(&dropped),
            },
        );
        metrics::set_stream_subscribers(registry.subscribers.len());
        drop(registry);

        tracing::debug!(subscriber_id = id, "Subscriber registered");
        Ok(Subscriber { id, rx, dropped })
    }

    /// Remove a subscriber from the live set.
    ///
    /// Returns whether the subscriber was present. Unknown or already
    /// removed ids are ignored.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut registry = self.registry.write();
        let removed = registry.subscribers.remove(&id).is_some();
        metrics::set_stream_subscribers(registry.subscribers.len());
        drop(registry);

        if removed {
            tracing::debug!(subscriber_id = id, "Subscriber unregistered");
        }
        removed
    }

    /// Deliver `value` to every subscriber registered at call time.
    ///
    /// Never blocks: subscribers with a full queue miss this value.
    ///
    /// # Errors
    ///
    /// Returns `BroadcastError::Closed` once `close` has been called; the
    /// value is discarded.
    pub fn submit(&self, value: T) -> Result<Delivery, BroadcastError> {
        let registry = self.registry.read();
        if registry.closed {
            return Err(BroadcastError::Closed);
        }

        let mut delivery = Delivery::default();
        for (id, slot) in &registry.subscribers {
            match slot.tx.try_send(value.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    slot.dropped.fetch_add(1, Ordering::Relaxed);
                    delivery.dropped += 1;
                    tracing::trace!(subscriber_id = id, "Subscriber queue full, value dropped");
                }
                // Receiver dropped without unregistering; it is removed when
                // its owner unregisters.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        drop(registry);

        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(delivery.delivered as u64, Ordering::Relaxed);
        self.dropped
            .fetch_add(delivery.dropped as u64, Ordering::Relaxed);
        Ok(delivery)
    }

    /// Close the hub.
    ///
    /// Further registrations fail, submits become no-ops, and every
    /// subscriber reaches end-of-stream after draining its queue. Calling
    /// this more than once is harmless.
    pub fn close(&self) {
        let mut registry = self.registry.write();
        if registry.closed {
            return;
        }
        registry.closed = true;
        let released = registry.subscribers.len();
        registry.subscribers.clear();
        drop(registry);
        metrics::set_stream_subscribers(0);

        tracing::info!(subscribers = released, "Broadcaster closed");
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.registry.read().closed
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.read().subscribers.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.registry.read().subscribers.contains_key(&id)
    }

    /// Get statistics about the hub.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        let registry = self.registry.read();
        BroadcastStats {
            subscribers: registry.subscribers.len(),
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            closed: registry.closed,
        }
    }
}

impl<T: Clone> Broadcaster<T> {
    /// Register a subscriber that unregisters itself when dropped.
    ///
    /// # Errors
    ///
    /// Returns `BroadcastError::Closed` once `close` has been called.
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription<T>, BroadcastError> {
        let subscriber = self.register()?;
        Ok(Subscription {
            broadcaster: Arc::clone(self),
            subscriber,
        })
    }
}

impl<T> std::fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Broadcaster")
            .field("capacity", &self.capacity)
            .field("subscribers", &registry.subscribers.len())
            .field("closed", &registry.closed)
            .finish_non_exhaustive()
    }
}

/// Shared broadcaster reference.
pub type SharedBroadcaster<T> = Arc<Broadcaster<T>>;

// =============================================================================
// Subscriber
// =============================================================================

/// Receiving handle for one registered subscriber.
#[derive(Debug)]
pub struct Subscriber<T> {
    id: SubscriberId,
    rx: mpsc::Receiver<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> Subscriber<T> {
    /// Identifier used to unregister this subscriber.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next value.
    ///
    /// Returns `None` once the subscriber has been unregistered or the hub
    /// closed and the queue is drained. Cancel safe.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Values dropped for this subscriber because its queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A subscriber tied to its broadcaster, unregistered on drop.
///
/// Dropping the subscription on any exit path, unwinding included,
/// removes it from the live set.
pub struct Subscription<T: Clone> {
    broadcaster: Arc<Broadcaster<T>>,
    subscriber: Subscriber<T>,
}

impl<T: Clone> Subscription<T> {
    /// Identifier of the underlying subscriber.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.subscriber.id
    }

    /// Wait for the next value. Cancel safe.
    pub async fn recv(&mut self) -> Option<T> {
        self.subscriber.recv().await
    }

    /// Values dropped for this subscriber because its queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.subscriber.dropped()
    }
}

impl<T: Clone> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.subscriber.id);
    }
}

impl<T: Clone> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.subscriber.id)
            .field("dropped", &self.subscriber.dropped())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
