//! Error types for verso_db

use thiserror::Error;

/// Result type alias for verso_db operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in verso_db operations
///
/// Missing objects, versions, attachments and attachment names are expected
/// conditions: the public [`Database`](crate::Database) API reports them as a
/// failed [`Reply`](crate::Reply) instead of an `Err`. Everything else here is
/// surfaced to the caller as-is.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Version {version} of object {object} already exists")]
    VersionConflict { object: String, version: u64 },

    #[error("Store is not open")]
    NotOpen,

    #[error("Config error: {0}")]
    Config(String),
}
