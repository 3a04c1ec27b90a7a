//! Error types for the extraction engine.

use thiserror::Error;

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Inbound message could not be decoded into a file-ready event
    #[error("Decode error: {0}")]
    Decode(String),

    /// Object could not be fetched from the object store
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Extractor failed on unrecoverable input
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Persistence store rejected or failed an operation
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Broker-level failure (poll, commit, seek, publish)
    #[error("Broker error: {0}")]
    Broker(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure modes of the retrieval gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// The object does not exist.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// The credentials are not allowed to read the object.
    #[error("access denied: {bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    /// Network, TLS or unexpected status failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl Error {
    /// Whether this error came from decoding the inbound message.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}
