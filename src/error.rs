//! SchemaSense error types

use thiserror::Error;

/// SchemaSense error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed classification request, rejected before any matching
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Session lookup or lifecycle error
    #[error("Session error: {0}")]
    Session(String),

    /// Review change referencing a field the session does not contain
    #[error("Unknown field '{field_key}' in session {session_id}")]
    UnknownField {
        session_id: String,
        field_key: String,
    },

    /// AI classification service error
    #[error("AI classifier error: {0}")]
    Ai(String),

    /// Result store error
    #[error("Store error: {0}")]
    Store(String),

    /// A consolidated verdict broke a checked invariant
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error is caused by the caller (bad input or unknown key)
    /// rather than by the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::UnknownField { .. } | Error::Session(_)
        )
    }
}

/// Result type alias for SchemaSense operations
pub type Result<T> = std::result::Result<T, Error>;
