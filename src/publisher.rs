use std::sync::Arc;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::store::{Fields, LogStore};

/// Appends messages to the log.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn LogStore>,
    settings: Arc<Settings>,
}

impl Publisher {
    pub fn new(store: Arc<dyn LogStore>, settings: Arc<Settings>) -> Self {
        Self { store, settings }
    }

    /// Append `text` as a new record and return it as a [`Message`].
    ///
    /// Empty text is rejected before the store is touched. Store failures
    /// are returned as-is; trimming to `max_len` is left to the store.
    pub async fn publish(&self, text: &str) -> Result<Message> {
        if text.is_empty() {
            return Err(Error::Validation("message cannot be empty".to_string()));
        }

        let mut fields = Fields::new();
        fields.insert(self.settings.field.clone(), serde_json::Value::from(text));

        let id = self
            .store
            .append(&self.settings.stream, fields, self.settings.max_len)
            .await?;
        tracing::debug!(%id, stream = %self.settings.stream, "message published");

        Ok(Message {
            id: id.to_string(),
            text: text.to_string(),
        })
    }
}
