//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No live session with this id
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The session was written by someone else since it was read
    #[error("Session modified concurrently: {0}")]
    Conflict(String),

    /// Backend unreachable or failed
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid session ID
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),
}

impl SessionError {
    /// Whether the error means the session no longer exists for the client.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            SessionError::NotFound(_) | SessionError::InvalidSessionId(_)
        )
    }
}
