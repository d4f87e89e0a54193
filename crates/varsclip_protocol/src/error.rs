//! Error types for protocol decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding wire data.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Body was not valid JSON for the expected type.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 payload could not be decoded.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// An event stream frame named an unknown event.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// An event stream frame did not match its declared event name.
    #[error("event mismatch: frame says {frame}, payload says {payload}")]
    EventMismatch {
        /// Name from the `event:` line.
        frame: String,
        /// Name from the payload's `type` field.
        payload: String,
    },
}
