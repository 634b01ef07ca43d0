use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::history::History;
use crate::hub::Hub;
use crate::message::Message;
use crate::publisher::Publisher;
use crate::store::LogStore;
use crate::subscription::{Subscription, SubscriptionManager};
use crate::tailer::{self, IngestExit};

/// Entry point for callers: create, list, and follow messages.
///
/// All three operations share one store. Live updates come from the single
/// ingest task started by [`Resolver::start_ingest`], never from the store
/// directly.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn LogStore>,
    settings: Arc<Settings>,
    publisher: Publisher,
    history: History,
    hub: Hub,
    subscriptions: SubscriptionManager,
    ingesting: Arc<AtomicBool>,
}

impl Resolver {
    pub fn new(store: Arc<dyn LogStore>, settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let hub = Hub::new(settings.queue_capacity);
        Self {
            publisher: Publisher::new(store.clone(), settings.clone()),
            history: History::new(store.clone(), settings.clone()),
            subscriptions: SubscriptionManager::new(hub.clone()),
            hub,
            store,
            settings,
            ingesting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn create_message(&self, text: &str) -> Result<Message> {
        self.publisher.publish(text).await
    }

    pub async fn messages(&self) -> Result<Vec<Message>> {
        self.history.read().await
    }

    /// Open a subscription that lives until `cancel` fires.
    pub fn subscribe(&self, cancel: CancellationToken) -> Subscription {
        self.subscriptions.subscribe(cancel)
    }

    /// Live messages published from now on, until `cancel` fires.
    pub fn message_created(
        &self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Message> + Send + 'static {
        self.subscribe(cancel).into_stream()
    }

    /// Start tailing the log into the hub. Allowed once per resolver.
    pub fn start_ingest(&self, cancel: CancellationToken) -> Result<JoinHandle<IngestExit>> {
        if self.ingesting.swap(true, Ordering::SeqCst) {
            return Err(Error::IngestRunning);
        }
        Ok(tailer::ingest(
            self.hub.clone(),
            self.store.clone(),
            self.settings.clone(),
            cancel,
        ))
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
