//! Error types for Telemetry-Store

use thiserror::Error;

/// Result type alias for Telemetry-Store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Telemetry-Store
#[derive(Error, Debug)]
pub enum Error {
    /// Storage backend errors (save/load/delete failed)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A persisted segment failed validation while being read
    #[error("Corrupt segment {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// A segment key that does not end in `-YYYY-MM-DD`
    #[error("Invalid segment key: {0}")]
    InvalidKey(String),

    /// Query validation or execution errors
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store was closed and no longer accepts writes
    #[error("Store is closed")]
    Closed,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Attach a segment key to a decoding failure.
    pub fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        Error::Corrupt {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Other(e.to_string())
    }
}
