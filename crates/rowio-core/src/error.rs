//! Error types for RowIO.

use thiserror::Error;

/// Main error type for RowIO operations.
#[derive(Error, Debug)]
pub enum RowioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Raised by a stage that observed its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Decoder error: {0}")]
    Decode(String),

    #[error("Encoder error: {0}")]
    Encode(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, rejected before any I/O.
    Validation,
    /// Target already present; recoverable with an explicit overwrite.
    AlreadyExists,
    /// Requested resource is absent or unreadable.
    NotFound,
    /// Cooperative cancellation. Not a failure.
    Cancelled,
    /// Decode, encode, detector or filesystem failure during a stage.
    Processing,
    /// Unrecognized data blocks a destructive action.
    Integrity,
}

impl RowioError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Io(_)
            | Self::Decode(_)
            | Self::Encode(_)
            | Self::Detector(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::Processing,
        }
    }

    /// Whether this is the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias for RowIO operations.
pub type Result<T> = std::result::Result<T, RowioError>;
