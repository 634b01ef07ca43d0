use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{Record, RecordId};

/// Stream every message is appended to.
pub const STREAM_KEY: &str = "room";
/// Record field carrying the message text.
pub const MESSAGE_FIELD: &str = "message";
/// Retained records per stream; older ones are trimmed on append.
pub const STREAM_MAX_LEN: usize = 1;
/// Records fetched per tail read.
pub const TAIL_READ_COUNT: usize = 1;
/// Upper bound on records returned by a history read.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("record {id} has no `{field}` field")]
    MissingField { id: RecordId, field: String },

    #[error("record {id} field `{field}` is not text")]
    NotText { id: RecordId, field: String },
}

/// Domain view of a log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
}

impl Message {
    /// Decode `record`, taking the text from `field`.
    ///
    /// Only a JSON string is accepted; numbers and other values are a
    /// format violation rather than something to coerce.
    pub fn decode(record: &Record, field: &str) -> Result<Self, FormatError> {
        match record.fields.get(field) {
            Some(serde_json::Value::String(text)) => Ok(Self {
                id: record.id.to_string(),
                text: text.clone(),
            }),
            Some(_) => Err(FormatError::NotText {
                id: record.id,
                field: field.to_string(),
            }),
            None => Err(FormatError::MissingField {
                id: record.id,
                field: field.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Fields;

    fn record(field: &str, value: serde_json::Value) -> Record {
        let mut fields = Fields::new();
        fields.insert(field.to_string(), value);
        Record {
            id: RecordId::new(1, 0),
            fields,
        }
    }

    #[test]
    fn decode_text_field() {
        let msg = Message::decode(&record("message", "hello".into()), MESSAGE_FIELD).unwrap();
        assert_eq!(msg.id, "1-0");
        assert_eq!(msg.text, "hello");
    }

    #[test]
    fn decode_rejects_non_text() {
        let err = Message::decode(&record("message", 12345.into()), MESSAGE_FIELD).unwrap_err();
        assert!(matches!(err, FormatError::NotText { .. }));
    }

    #[test]
    fn decode_rejects_missing_field() {
        let err = Message::decode(&record("other", "hello".into()), MESSAGE_FIELD).unwrap_err();
        assert_eq!(
            err,
            FormatError::MissingField {
                id: RecordId::new(1, 0),
                field: "message".to_string(),
            }
        );
    }

    #[test]
    fn message_serializes_id_and_text() {
        let msg = Message {
            id: "1-0".to_string(),
            text: "hi".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"id": "1-0", "text": "hi"}));
    }
}
