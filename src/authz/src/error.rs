//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
///
/// Unknown ids are not errors: lookups return `None` or empty collections.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Request rejected before any lookup (missing or empty fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failure reported by the storage backend; never retried here
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Record could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or unsupported configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "sled-backend")]
impl From<sled::Error> for AuthzError {
    fn from(err: sled::Error) -> Self {
        AuthzError::BackendUnavailable(err.to_string())
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
