//! Error type shared across Revenda crates.

use thiserror::Error;

/// All errors the Revenda crates surface.
#[derive(Debug, Error)]
pub enum RevendaError {
    /// Configuration file missing, unreadable, or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Storage layer failure (SQLite or collaborator).
    #[error("storage error: {0}")]
    Storage(String),

    /// A time-of-day string that is not `HH:MM` 24h.
    #[error("invalid scheduled time '{0}': expected HH:MM")]
    InvalidTime(String),

    /// A civil date string that is not `YYYY-MM-DD`.
    #[error("invalid civil date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for RevendaError {
    fn from(e: rusqlite::Error) -> Self {
        RevendaError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for RevendaError {
    fn from(e: serde_json::Error) -> Self {
        RevendaError::Storage(format!("json: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, RevendaError>;
