//! # Disk Error Types Module
//!
//! This module defines the error type returned by the remote disk adapter.
//! Callers distinguish "could not enumerate" failures (network, timeout,
//! open circuit) from definite answers such as a missing folder.

use thiserror::Error;

/// Errors produced while talking to the remote disk
#[derive(Debug, Error)]
pub enum DiskError {
    /// No OAuth token is configured for the user
    #[error("OAuth token not set, authorize with /auth first")]
    NotAuthorized,

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout (after retries)
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists (folder creation)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Any other non-success HTTP status
    #[error("Yandex Disk error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Circuit breaker is open, requests fail fast
    #[error("Disk unavailable: {0}")]
    Unavailable(String),

    /// Response body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Local file access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for remote disk operations
pub type DiskResult<T> = Result<T, DiskError>;

impl DiskError {
    /// Whether the failure says nothing about the remote state and may go
    /// away on its own. Transient failures feed the circuit breaker.
    pub fn is_transient(&self) -> bool {
        match self {
            DiskError::Network(_) | DiskError::Timeout(_) | DiskError::Unavailable(_) => true,
            DiskError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DiskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DiskError::Timeout(err.to_string())
        } else if err.is_decode() {
            DiskError::InvalidResponse(err.to_string())
        } else {
            DiskError::Network(err.to_string())
        }
    }
}
