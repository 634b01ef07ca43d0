//! Durable log boundary.
//!
//! The broadcaster only ever talks to the log through [`LogStore`]: an
//! ordered append-only stream of [`Record`]s with an `append` primitive
//! (optionally capped to a retained length) and a `read` primitive that can
//! block until something newer than a cursor shows up.
//!
//! [`MemoryLog`] is the in-process backend. It keeps records for the
//! lifetime of the process only; durable persistence belongs to whatever
//! store is plugged in behind the trait.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Field map of a single record. Values are dynamically typed on purpose:
/// whatever wrote the record decides the shape, and readers validate it.
pub type Fields = BTreeMap<String, serde_json::Value>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("log store is closed")]
    Closed,

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("log store unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Position of a record in its stream.
///
/// Ordered by `(millis, seq)`. Rendered as `"<millis>-<seq>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    pub millis: u64,
    pub seq: u64,
}

impl RecordId {
    pub fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// Next ID after `last`, anchored to the wall clock when it has moved on.
    fn next_after(last: Option<RecordId>) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        match last {
            Some(last) if now <= last.millis => Self::new(last.millis, last.seq + 1),
            _ => Self::new(now, 0),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

/// One immutable entry of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

/// Where a read starts. Records strictly after the cursor are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Everything still retained.
    Start,
    /// Only records appended after the read is issued.
    Tip,
    After(RecordId),
}

/// How long a read may wait for a matching record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    NoWait,
    Forever,
    Timeout(Duration),
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one record and return the ID the store assigned to it.
    ///
    /// With `max_len = Some(n)` the store trims its oldest records so that
    /// at most `n` remain retained.
    async fn append(
        &self,
        stream: &str,
        fields: Fields,
        max_len: Option<usize>,
    ) -> Result<RecordId, StoreError>;

    /// Read at most `count` records after `cursor`, in log order.
    ///
    /// An empty vec means nothing arrived within the `block` window.
    async fn read(
        &self,
        stream: &str,
        cursor: Cursor,
        count: usize,
        block: Block,
    ) -> Result<Vec<Record>, StoreError>;
}

#[derive(Default)]
struct Stream {
    entries: VecDeque<Record>,
    /// Survives trimming so IDs stay monotonic.
    last_id: Option<RecordId>,
}

impl Stream {
    fn after(&self, floor: Option<RecordId>, count: usize) -> Vec<Record> {
        self.entries
            .iter()
            .filter(|r| floor.map_or(true, |f| r.id > f))
            .take(count)
            .cloned()
            .collect()
    }
}

struct Inner {
    streams: Mutex<HashMap<String, Stream>>,
    closed: AtomicBool,
    appended: Notify,
}

/// In-process [`LogStore`] backed by one ring of records per stream.
#[derive(Clone)]
pub struct MemoryLog {
    inner: Arc<Inner>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                streams: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                appended: Notify::new(),
            }),
        }
    }

    /// Number of records currently retained in `stream`.
    pub fn len(&self, stream: &str) -> usize {
        self.inner
            .streams
            .lock()
            .get(stream)
            .map_or(0, |s| s.entries.len())
    }

    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }

    /// Shut the store down. Blocked and future calls fail with
    /// [`StoreError::Closed`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.appended.notify_waiters();
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for MemoryLog {
    async fn append(
        &self,
        stream: &str,
        fields: Fields,
        max_len: Option<usize>,
    ) -> Result<RecordId, StoreError> {
        self.check_open()?;
        if fields.is_empty() {
            return Err(StoreError::Rejected("record has no fields".into()));
        }

        let id = {
            let mut streams = self.inner.streams.lock();
            let s = streams.entry(stream.to_string()).or_default();
            let id = RecordId::next_after(s.last_id);
            s.entries.push_back(Record { id, fields });
            s.last_id = Some(id);
            if let Some(max) = max_len {
                while s.entries.len() > max {
                    s.entries.pop_front();
                }
            }
            id
        };

        self.inner.appended.notify_waiters();
        Ok(id)
    }

    async fn read(
        &self,
        stream: &str,
        cursor: Cursor,
        count: usize,
        block: Block,
    ) -> Result<Vec<Record>, StoreError> {
        self.check_open()?;
        let count = count.max(1);

        let floor = match cursor {
            Cursor::Start => None,
            Cursor::After(id) => Some(id),
            Cursor::Tip => self
                .inner
                .streams
                .lock()
                .get(stream)
                .and_then(|s| s.last_id),
        };

        let deadline = match block {
            Block::Timeout(d) => Some(tokio::time::Instant::now() + d),
            _ => None,
        };

        loop {
            // Arm the notification before looking, so an append landing
            // between the check and the await still wakes us.
            let notified = self.inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.check_open()?;
            let found = self
                .inner
                .streams
                .lock()
                .get(stream)
                .map(|s| s.after(floor, count))
                .unwrap_or_default();
            if !found.is_empty() {
                return Ok(found);
            }

            match block {
                Block::NoWait => return Ok(found),
                Block::Forever => notified.await,
                Block::Timeout(_) => {
                    let Some(deadline) = deadline else {
                        return Ok(found);
                    };
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(Vec::new());
                    }
                }
            }
        }
    }
}
