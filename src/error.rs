//! Muninn error types

use std::time::Duration;

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Record store errors
    /// The key vanished between enumeration and read.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The store could not be reached or rejected the command.
    ///
    /// This is the only systemic error: it aborts a curation pass.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed record {key}: {reason}")]
    MalformedRecord { key: String, reason: String },

    // Content intelligence errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("unparseable model response: {0}")]
    UnparseableResponse(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl MuninnError {
    /// Whether a retry of the same intelligence call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MuninnError::RateLimited { .. } | MuninnError::Http(_) | MuninnError::Timeout(_) => {
                true
            }
            MuninnError::Api { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MuninnError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether this error must abort the whole curation pass.
    pub fn is_systemic(&self) -> bool {
        matches!(self, MuninnError::StoreUnavailable(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for MuninnError {
    fn from(err: redis::RedisError) -> Self {
        MuninnError::StoreUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for MuninnError {
    fn from(err: std::io::Error) -> Self {
        MuninnError::Io(err.to_string())
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
