//! Fan-out of tailed messages to live subscriber queues.
//!
//! The registry maps each [`SubscriptionToken`] to the sending half of a
//! bounded queue. It is only reachable through [`Hub`]'s methods, and all of
//! them go through the same lock, so a delivery always sees a stable set of
//! subscribers.
//!
//! Delivery never blocks: a queue that is still full from the previous
//! message simply misses this one. One stalled consumer cannot hold up the
//! rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::message::Message;
use crate::subscription::SubscriptionToken;

/// Outcome of delivering one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub skipped: usize,
}

struct Inner {
    registry: Mutex<HashMap<SubscriptionToken, mpsc::Sender<Message>>>,
    capacity: usize,
    dropped: AtomicU64,
}

#[derive(Clone)]
pub struct Hub {
    inner: Arc<Inner>,
}

impl Hub {
    /// Create a hub whose subscriber queues hold `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Add a queue for `token` and return its receiving end.
    pub fn register(&self, token: SubscriptionToken) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let (replaced, subscribers) = {
            let mut registry = self.inner.registry.lock();
            let replaced = registry.insert(token.clone(), tx).is_some();
            (replaced, registry.len())
        };
        if replaced {
            tracing::warn!(%token, "subscription token re-registered, previous queue replaced");
        }
        tracing::debug!(%token, subscribers, "subscriber registered");
        rx
    }

    /// Remove `token`'s queue. Returns false if it was not registered.
    pub fn unregister(&self, token: &SubscriptionToken) -> bool {
        let (removed, subscribers) = {
            let mut registry = self.inner.registry.lock();
            let removed = registry.remove(token).is_some();
            (removed, registry.len())
        };
        if removed {
            tracing::debug!(%token, subscribers, "subscriber unregistered");
        }
        removed
    }

    /// Offer `message` to every registered queue without waiting.
    pub fn deliver(&self, message: &Message) -> Delivery {
        let mut delivery = Delivery::default();
        let mut closed = 0usize;
        {
            // No logging in here: the lock must not wait on a log sink.
            let registry = self.inner.registry.lock();
            for tx in registry.values() {
                match tx.try_send(message.clone()) {
                    Ok(()) => delivery.delivered += 1,
                    Err(TrySendError::Full(_)) => delivery.skipped += 1,
                    Err(TrySendError::Closed(_)) => {
                        delivery.skipped += 1;
                        closed += 1;
                    }
                }
            }
        }

        if delivery.skipped > 0 {
            self.inner
                .dropped
                .fetch_add(delivery.skipped as u64, Ordering::Relaxed);
            tracing::debug!(
                id = %message.id,
                skipped = delivery.skipped,
                closed,
                "some subscribers missed a message"
            );
        }
        delivery
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    pub fn contains(&self, token: &SubscriptionToken) -> bool {
        self.inner.registry.lock().contains_key(token)
    }

    /// Deliveries skipped since the hub was created.
    pub fn dropped_total(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}
