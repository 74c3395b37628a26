//! Error types for the mapsync system
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for mapsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the mapsync system
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure talking to a source (DNS, TLS, timeout, body read)
    #[error("Source error: {0}")]
    Source(String),

    /// The source answered with a non-success HTTP status
    #[error("Upstream {source_id} returned {status}: {message}")]
    Upstream {
        /// Source identifier the request was made for
        source_id: String,
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Record store failures that are not raw SQL errors
    #[error("Record store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite errors from the persistent store
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// An operation exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
        /// The deadline that was exceeded
        after: Duration,
    },

    /// Every palette colour is taken and the policy forbids reuse
    #[error("No colour left in the palette for status '{status}'")]
    PaletteExhausted {
        /// Status name that could not be coloured
        status: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a source transport error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create an upstream status error
    pub fn upstream(source_id: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            source_id: source_id.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a record store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// True when the error originates upstream rather than locally
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, Self::Source(_) | Self::Upstream { .. })
    }

    /// True when the local record store could not serve the request
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Sqlx(_) | Self::Io(_) | Self::Timeout { .. }
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
