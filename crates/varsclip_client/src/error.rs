//! Error types for the varsclip client.

use thiserror::Error;
use varsclip_core::CoreError;
use varsclip_protocol::{ErrorBody, ProtocolError};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server rejected the request.
    #[error("{message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Message from the server.
        message: String,
        /// The session needs a password.
        requires_password: bool,
    },

    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Rejected locally before anything was sent.
    #[error("{0}")]
    Invalid(String),

    /// The session was deleted while open.
    #[error("session closed")]
    Closed,
}

impl ClientError {
    /// Builds an API error from a status and error body.
    pub fn api(status: u16, body: ErrorBody) -> Self {
        ClientError::Api {
            status,
            message: body.error,
            requires_password: body.requires_password.unwrap_or(false),
        }
    }

    /// Returns the HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Invalid(_) => Some(400),
            _ => None,
        }
    }

    /// Returns true if the session asked for a password.
    pub fn requires_password(&self) -> bool {
        matches!(
            self,
            ClientError::Api {
                requires_password: true,
                ..
            }
        )
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        ClientError::api(err.status_code(), ErrorBody::from_core(&err))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Transport(format!("invalid response body: {err}"))
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClientError::Transport(format!("worker task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_become_api_errors() {
        let err = ClientError::from(CoreError::password_required());
        assert_eq!(err.status(), Some(401));
        assert!(err.requires_password());
        assert!(err.is_client_error());

        let err = ClientError::from(CoreError::Storage("disk".into()));
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn transport_has_no_status() {
        let err = ClientError::Transport("refused".into());
        assert_eq!(err.status(), None);
        assert!(!err.is_client_error());
    }
}
