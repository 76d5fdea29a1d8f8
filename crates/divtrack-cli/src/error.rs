use std::io;

use divtrack_core::sync::SyncError;
use divtrack_core::DividendId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] divtrack_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No user given. Pass --user or set DIVTRACK_USER_ID.")]
    MissingUser,
    #[error("Stock symbol cannot be empty")]
    EmptyStock,
    #[error("Could not load dividends from {0}")]
    LoadFailed(String),
    #[error("Dividend not found: {0}")]
    DividendNotFound(DividendId),
}
