use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::message::Message;
use crate::store::{Block, Cursor, LogStore};

/// Point-in-time read of the retained log, separate from live tailing.
#[derive(Clone)]
pub struct History {
    store: Arc<dyn LogStore>,
    settings: Arc<Settings>,
}

impl History {
    pub fn new(store: Arc<dyn LogStore>, settings: Arc<Settings>) -> Self {
        Self { store, settings }
    }

    /// Oldest-first messages still retained by the log, up to the
    /// configured history limit. Fails as a whole on a malformed record.
    pub async fn read(&self) -> Result<Vec<Message>> {
        let records = self
            .store
            .read(
                &self.settings.stream,
                Cursor::Start,
                self.settings.history_limit,
                Block::NoWait,
            )
            .await?;

        records
            .iter()
            .map(|r| Message::decode(r, &self.settings.field).map_err(Into::into))
            .collect()
    }
}
