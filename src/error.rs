//! Error types for the gatekeeping layer.

use thiserror::Error;

/// Main error type for gatekeeping operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Startup misconfiguration; never surfaces to end users.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed credential check. Carries nothing about the attempted token.
    #[error("unauthorized")]
    Unauthorized,

    /// Digest generation errors
    #[error("Hash error: {0}")]
    Hash(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gatekeeping operations.
pub type Result<T> = std::result::Result<T, GateError>;
