//! Error types for Warden.

use thiserror::Error;

/// Main error type for Warden operations.
#[derive(Error, Debug)]
pub enum WardenError {
    /// Threshold or ttl missing, non-numeric, or negative
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The namespace has no permit left in its current window.
    ///
    /// Only the asynchronous adapters report this; the synchronous checks
    /// return `false` instead.
    #[error("Rate limited: {namespace}")]
    RateLimited { namespace: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
