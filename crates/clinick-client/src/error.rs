//! Error types for backend communication

use thiserror::Error;

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the backend
#[derive(Error, Debug)]
pub enum ClientError {
    /// The configured base URL cannot carry endpoint paths
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// Offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The request never produced a response (connection, timeout, TLS)
    #[error("Request to {endpoint} failed: {source}")]
    Request {
        /// Endpoint path
        endpoint: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint path
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be decoded
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode {
        /// Endpoint path
        endpoint: String,
        /// Decoder message
        message: String,
    },

    /// Failure injected by a test backend
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    /// Whether the backend was reached and rejected the request
    #[must_use]
    pub const fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    /// HTTP status code, when the backend answered
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
