//! Error types for the dashboard, submission and export flows

use clinick_client::ClientError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Errors surfaced to the user of the dashboard
#[derive(Error, Debug)]
pub enum DashboardError {
    /// Core error (configuration, validation, authentication)
    #[error(transparent)]
    Core(#[from] clinick_core::Error),

    /// Backend communication error
    #[error(transparent)]
    Client(#[from] ClientError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Local storage could not be read or written
    #[error("Storage error for {path}: {message}")]
    Storage {
        /// File involved
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The backend answered the submission with a non-success status
    #[error("Failed to submit (HTTP {status})")]
    SubmissionRejected {
        /// HTTP status code
        status: u16,
    },

    /// The submission never reached the backend
    #[error("Server error: {message}")]
    SubmissionFailed {
        /// Error message
        message: String,
    },

    /// An export was requested without a month filter
    #[error("Please select a month first.")]
    MonthRequired,

    /// Export rendering or writing failed
    #[error("Export failed: {message}")]
    Export {
        /// Error message
        message: String,
    },

    /// No valid session
    #[error("Not logged in")]
    NotAuthenticated,
}

impl DashboardError {
    /// Create a storage error
    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an export error
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    /// Map a failed `create_report` call to the user-facing submission error
    #[must_use]
    pub fn from_submission(error: ClientError) -> Self {
        match error.status() {
            Some(status) => Self::SubmissionRejected { status },
            None => Self::SubmissionFailed {
                message: error.to_string(),
            },
        }
    }
}
