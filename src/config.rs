use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::message::{HISTORY_LIMIT, MESSAGE_FIELD, STREAM_KEY, STREAM_MAX_LEN, TAIL_READ_COUNT};

/// Per-queue capacity: a slow subscriber holds at most one pending message.
pub const QUEUE_CAPACITY: usize = 1;
pub const KEEPALIVE_SECS: u64 = 10;

/// How the broadcaster talks to the log and sizes subscriber queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub stream: String,
    pub field: String,
    /// `None` keeps every record.
    pub max_len: Option<usize>,
    pub read_count: usize,
    pub history_limit: usize,
    pub queue_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stream: STREAM_KEY.to_string(),
            field: MESSAGE_FIELD.to_string(),
            max_len: Some(STREAM_MAX_LEN),
            read_count: TAIL_READ_COUNT,
            history_limit: HISTORY_LIMIT,
            queue_capacity: QUEUE_CAPACITY,
        }
    }
}

/// Command-line configuration for the `roomcast` server.
#[derive(Parser, Debug, Clone)]
#[command(name = "roomcast", version, about = "Live message broadcaster over an append-only log")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "ROOMCAST_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Stream key messages are appended to
    #[arg(long, env = "ROOMCAST_STREAM", default_value = STREAM_KEY)]
    pub stream: String,

    /// Record field holding the message text
    #[arg(long, env = "ROOMCAST_FIELD", default_value = MESSAGE_FIELD)]
    pub field: String,

    /// Records retained in the stream (0 keeps everything)
    #[arg(long, env = "ROOMCAST_MAX_LEN", default_value_t = STREAM_MAX_LEN)]
    pub max_len: usize,

    /// Records fetched per tail read
    #[arg(long, env = "ROOMCAST_READ_COUNT", default_value_t = TAIL_READ_COUNT, value_parser = positive)]
    pub read_count: usize,

    /// Maximum records returned by a history read
    #[arg(long, env = "ROOMCAST_HISTORY_LIMIT", default_value_t = HISTORY_LIMIT, value_parser = positive)]
    pub history_limit: usize,

    /// Pending messages buffered per subscriber
    #[arg(long, env = "ROOMCAST_QUEUE_CAPACITY", default_value_t = QUEUE_CAPACITY, value_parser = positive)]
    pub queue_capacity: usize,

    /// Seconds between WebSocket keepalive pings
    #[arg(long, env = "ROOMCAST_KEEPALIVE_SECS", default_value_t = KEEPALIVE_SECS, value_parser = positive_u64)]
    pub keepalive_secs: u64,
}

impl Config {
    pub fn settings(&self) -> Settings {
        Settings {
            stream: self.stream.clone(),
            field: self.field.clone(),
            max_len: (self.max_len > 0).then_some(self.max_len),
            read_count: self.read_count,
            history_limit: self.history_limit,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

fn positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn positive_u64(s: &str) -> Result<u64, String> {
    positive(s).map(|n| n as u64)
}
