use std::io;

use thiserror::Error;

use crate::source::RawMessage;

/// Failures raised while pulling messages for one channel.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Provider asked us to back off before the next request. `partial`
    /// holds whatever the channel yielded before the signal.
    #[error("rate limited, retry after {seconds}s")]
    RateLimited { seconds: u64, partial: Vec<RawMessage> },
    #[error("channel '{0}' not found")]
    ChannelNotFound(String),
    #[error("unexpected status {status} for channel '{channel}'")]
    Status { channel: String, status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The vacancy frame carries no `company`/`description` columns to derive from.
    #[error("vacancies have no 'company' or 'description' columns")]
    MissingColumns,
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}
