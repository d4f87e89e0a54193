//! Error types for varsclip core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in session, item and credential operations.
///
/// Variants follow the lifecycle error taxonomy: every lifecycle operation
/// validates, then authorizes, then mutates, and returns the first failing
/// check as one of these.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input (session code, password, text, file metadata, duration).
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials.
    #[error("{message}")]
    Unauthorized {
        /// Description of the failure.
        message: String,
        /// Set when the caller should retry with a password.
        requires_password: bool,
    },

    /// Unknown session, item or code.
    #[error("{0}")]
    NotFound(String),

    /// Code already taken.
    #[error("{0}")]
    Conflict(String),

    /// Blob or record storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error from a filesystem-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an authorization error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            requires_password: false,
        }
    }

    /// Creates an authorization error asking the caller for a password.
    pub fn password_required() -> Self {
        Self::Unauthorized {
            message: "Password required".into(),
            requires_password: true,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Shorthand for the most common not-found case.
    pub fn session_not_found() -> Self {
        Self::NotFound("Session not found".into())
    }

    /// Returns the HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::Unauthorized { .. } => 401,
            CoreError::NotFound(_) => 404,
            CoreError::Conflict(_) => 409,
            CoreError::Storage(_) | CoreError::Io(_) | CoreError::Internal(_) => 500,
        }
    }

    /// Returns true if the caller is at fault (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if the failure is on our side (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Returns true if the error carries the "password required" hint.
    pub fn requires_password(&self) -> bool {
        matches!(
            self,
            CoreError::Unauthorized {
                requires_password: true,
                ..
            }
        )
    }
}
