//! # varsclip protocol
//!
//! Wire types shared by the varsclip server and client.
//!
//! This crate provides:
//! - JSON request/response bodies for the lifecycle functions and item
//!   endpoints
//! - The realtime message carried over server-sent events, and an
//!   incremental SSE decoder
//! - Route and header names
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod realtime;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    CleanupSessionRequest, CleanupSessionResponse, ClearTextResponse, ErrorBody,
    ExtendSessionRequest, ExtendSessionResponse, GrantAccessRequest, HasAccessResponse,
    ItemsResponse, SessionInfoResponse, SuccessResponse, TrackAnalyticsRequest,
    UpdateSettingsRequest, UpdateSettingsResponse, UploadFileRequest, UpsertTextRequest,
    VerifySessionRequest, VerifySessionResponse,
};
pub use realtime::{RealtimeMessage, SseDecoder, SseFrame};

/// Header carrying the admin shared secret.
pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Header carrying a session password on item endpoints.
pub const PASSWORD_HEADER: &str = "x-session-password";

/// Route paths.
///
/// Paths with a `{code}`, `{id}` or `{*path}` segment use axum's capture
/// syntax; [`session_path`] fills in a code for clients.
pub mod routes {
    /// Create or authenticate.
    pub const VERIFY_SESSION_PASSWORD: &str = "/functions/verify-session-password";
    /// Extend expiry.
    pub const EXTEND_SESSION: &str = "/functions/extend-session";
    /// Change password or visibility.
    pub const UPDATE_SESSION_SETTINGS: &str = "/functions/update-session-settings";
    /// Delete a session.
    pub const CLEANUP_EXPIRED_SESSION: &str = "/functions/cleanup-expired-session";
    /// Admin overview.
    pub const GET_ADMIN_DATA: &str = "/functions/get-admin-data";
    /// Record an analytics event.
    pub const TRACK_ANALYTICS: &str = "/functions/track-analytics";

    /// Session metadata.
    pub const SESSION: &str = "/sessions/{code}";
    /// Item list.
    pub const ITEMS: &str = "/sessions/{code}/items";
    /// Shared text: `PUT` upserts, `DELETE` clears.
    pub const TEXT: &str = "/sessions/{code}/items/text";
    /// One item.
    pub const ITEM: &str = "/sessions/{code}/items/{id}";
    /// File upload.
    pub const FILES: &str = "/sessions/{code}/files";
    /// Realtime event stream.
    pub const EVENTS: &str = "/sessions/{code}/events";
    /// Usage statistics.
    pub const STATS: &str = "/sessions/{code}/stats";
    /// Access grants.
    pub const ACCESS: &str = "/sessions/{code}/access";
    /// File download.
    pub const FILE_DOWNLOAD: &str = "/files/{*path}";
    /// Liveness probe.
    pub const HEALTH: &str = "/health";

    /// Substitutes `code` into a session route.
    pub fn session_path(route: &str, code: &str) -> String {
        route.replace("{code}", code)
    }
}

#[cfg(test)]
mod tests {
    use super::routes;

    #[test]
    fn session_path_substitution() {
        assert_eq!(
            routes::session_path(routes::EVENTS, "frdna"),
            "/sessions/frdna/events"
        );
        assert_eq!(
            routes::session_path(routes::ITEM, "frdna").replace("{id}", "x"),
            "/sessions/frdna/items/x"
        );
    }
}
