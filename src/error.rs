use thiserror::Error;

use crate::message::FormatError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("log ingestion is already running")]
    IngestRunning,
}

impl Error {
    /// True when the error only reports that the caller gave up.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Store(StoreError::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
