//! Error types for the varsclip server.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use varsclip_core::CoreError;
use varsclip_protocol::ErrorBody;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A session operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Malformed request body or query.
    #[error("{0}")]
    InvalidRequest(String),

    /// Admin secret missing or wrong.
    #[error("Unauthorized")]
    AdminUnauthorized,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Core(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::AdminUnauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Config(_) | ServerError::Io(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// Returns the body reported to the caller.
    pub fn body(&self) -> ErrorBody {
        match self {
            ServerError::Core(e) => ErrorBody::from_core(e),
            _ if self.is_server_error() => ErrorBody::new("Internal server error"),
            _ => ErrorBody::new(self.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::InvalidRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::InvalidRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("worker task failed: {e}"))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ServerError::from(CoreError::Conflict("taken".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::from(CoreError::password_required()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::InvalidRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn client_vs_server() {
        assert!(ServerError::AdminUnauthorized.is_client_error());
        assert!(ServerError::Config("x".into()).is_server_error());
        assert!(ServerError::from(CoreError::Storage("x".into())).is_server_error());
    }

    #[test]
    fn bodies_hide_internals() {
        let body = ServerError::Internal("secret detail".into()).body();
        assert_eq!(body.error, "Internal server error");

        let body = ServerError::from(CoreError::password_required()).body();
        assert_eq!(body.requires_password, Some(true));

        let body = ServerError::AdminUnauthorized.body();
        assert_eq!(body.error, "Unauthorized");
    }
}
