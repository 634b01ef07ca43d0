//! Live tail of the log.
//!
//! [`tail`] owns the read cursor: it starts at the tip of the stream, blocks
//! until the next record lands, decodes it and forwards it, then continues
//! from that record. The cursor lives only in the task, so after a restart
//! tailing resumes from the new tip and anything appended in between is
//! not replayed.
//!
//! [`ingest`] drains a tail into the [`Hub`]. Only one should run per log
//! stream; [`Resolver::start_ingest`](crate::resolver::Resolver::start_ingest)
//! enforces that.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::hub::Hub;
use crate::message::Message;
use crate::store::{Block, Cursor, LogStore};

/// Output of a running tail. Both channels close when the tail stops.
pub struct TailStreams {
    pub messages: mpsc::Receiver<Message>,
    /// Carries at most one error: the one that stopped the tail.
    pub errors: mpsc::Receiver<Error>,
}

/// Spawn the tail task. It stops on cancellation, on a store error, or on
/// a record that does not decode. It never retries.
pub fn tail(
    store: Arc<dyn LogStore>,
    settings: Arc<Settings>,
    cancel: CancellationToken,
) -> TailStreams {
    let (msg_tx, messages) = mpsc::channel(1);
    let (err_tx, errors) = mpsc::channel(1);

    tokio::spawn(async move {
        match run(store.as_ref(), &settings, &cancel, &msg_tx).await {
            Ok(()) => tracing::debug!(stream = %settings.stream, "tail stopped"),
            Err(e) if e.is_cancellation() => {
                tracing::debug!(stream = %settings.stream, "tail read cancelled")
            }
            Err(e) => {
                let _ = err_tx.try_send(e);
            }
        }
    });

    TailStreams { messages, errors }
}

async fn run(
    store: &dyn LogStore,
    settings: &Settings,
    cancel: &CancellationToken,
    msg_tx: &mpsc::Sender<Message>,
) -> Result<()> {
    let mut cursor = Cursor::Tip;

    loop {
        let records = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            read = store.read(&settings.stream, cursor, settings.read_count, Block::Forever) => read?,
        };

        // Anything past the first record is picked up by the next read.
        let Some(record) = records.first() else {
            continue;
        };
        let message = Message::decode(record, &settings.field)?;
        cursor = Cursor::After(record.id);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            sent = msg_tx.send(message) => {
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

/// Why an ingest task finished.
#[derive(Debug)]
pub enum IngestExit {
    Cancelled,
    Failed(Error),
    /// The tail ended without an error or a cancellation.
    StreamClosed,
}

/// Tail the log and hand every message to `hub`.
///
/// Stopping, for whatever reason, leaves registered subscribers in place;
/// they just stop receiving.
pub fn ingest(
    hub: Hub,
    store: Arc<dyn LogStore>,
    settings: Arc<Settings>,
    cancel: CancellationToken,
) -> JoinHandle<IngestExit> {
    tokio::spawn(async move {
        tracing::info!(stream = %settings.stream, "log ingestion started");
        let TailStreams {
            mut messages,
            mut errors,
        } = tail(store, settings, cancel.clone());

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("log ingestion cancelled");
                    return IngestExit::Cancelled;
                }
                next = messages.recv() => match next {
                    Some(message) => {
                        let delivery = hub.deliver(&message);
                        tracing::debug!(
                            id = %message.id,
                            delivered = delivery.delivered,
                            skipped = delivery.skipped,
                            "message fanned out"
                        );
                    }
                    None => break,
                },
            }
        }

        match errors.recv().await {
            Some(e) => {
                tracing::error!(error = %e, "log ingestion stopped");
                IngestExit::Failed(e)
            }
            None if cancel.is_cancelled() => IngestExit::Cancelled,
            None => {
                tracing::warn!("log tail closed");
                IngestExit::StreamClosed
            }
        }
    })
}
