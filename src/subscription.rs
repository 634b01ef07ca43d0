//! Subscription lifecycle: token issue, registration, and guaranteed
//! deregistration when the caller's cancellation token fires.

use std::fmt;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::hub::Hub;
use crate::message::Message;

/// Registry key for one live subscription: 128 random bits as hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(String);

impl SubscriptionToken {
    pub fn generate() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds a registry entry and removes it when dropped.
struct Registration {
    hub: Hub,
    token: SubscriptionToken,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.unregister(&self.token);
    }
}

/// Receiving side of one subscription.
pub struct Subscription {
    token: SubscriptionToken,
    queue: mpsc::Receiver<Message>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn token(&self) -> &SubscriptionToken {
        &self.token
    }

    /// Next message, or `None` once the subscription has been torn down.
    pub async fn recv(&mut self) -> Option<Message> {
        self.queue.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Message, mpsc::error::TryRecvError> {
        self.queue.try_recv()
    }

    /// Stream of messages that ends when the subscription is cancelled.
    pub fn into_stream(self) -> impl Stream<Item = Message> + Send + 'static {
        let cancel = self.cancel;
        ReceiverStream::new(self.queue).take_until(async move { cancel.cancelled().await })
    }
}

#[derive(Clone)]
pub struct SubscriptionManager {
    hub: Hub,
}

impl SubscriptionManager {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    /// Register a new subscriber tied to `cancel`.
    ///
    /// Returns immediately. The registry entry is removed exactly once,
    /// when `cancel` fires or the watcher task is torn down with the
    /// runtime.
    pub fn subscribe(&self, cancel: CancellationToken) -> Subscription {
        let token = SubscriptionToken::generate();
        let queue = self.hub.register(token.clone());
        let registration = Registration {
            hub: self.hub.clone(),
            token: token.clone(),
        };

        let watched = cancel.clone();
        tokio::spawn(async move {
            watched.cancelled().await;
            tracing::debug!(token = %registration.token, "subscription cancelled");
            drop(registration);
        });

        tracing::debug!(%token, "subscription created");
        Subscription {
            token,
            queue,
            cancel,
        }
    }
}
