//! Backend abstraction.
//!
//! The session hook talks to a [`Backend`]. Two implementations exist:
//! [`LoopbackBackend`](crate::LoopbackBackend) calls a
//! [`SessionService`](varsclip_core::SessionService) in-process, and
//! [`HttpBackend`](crate::HttpBackend) talks to a varsclip server.

use crate::error::ClientResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use varsclip_core::{Credentials, FileUpload, ItemId, SessionInfo, SessionItem};
use varsclip_protocol::{
    CleanupSessionRequest, CleanupSessionResponse, ExtendSessionRequest, ExtendSessionResponse,
    RealtimeMessage, UpdateSettingsRequest, UpdateSettingsResponse, VerifySessionRequest,
    VerifySessionResponse,
};

/// Realtime messages for one session, in order.
pub type EventStream = BoxStream<'static, ClientResult<RealtimeMessage>>;

/// Operations the session hook needs from the server side.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Creates or authenticates to a session.
    async fn verify_session(&self, request: VerifySessionRequest)
        -> ClientResult<VerifySessionResponse>;

    /// Extends a session's expiry.
    async fn extend_session(&self, request: ExtendSessionRequest)
        -> ClientResult<ExtendSessionResponse>;

    /// Changes a session's password or visibility.
    async fn update_settings(
        &self,
        request: UpdateSettingsRequest,
    ) -> ClientResult<UpdateSettingsResponse>;

    /// Deletes a session.
    async fn cleanup_session(
        &self,
        request: CleanupSessionRequest,
    ) -> ClientResult<CleanupSessionResponse>;

    /// Returns public session metadata.
    async fn session_info(&self, code: &str) -> ClientResult<SessionInfo>;

    /// Records an analytics event.
    async fn track(
        &self,
        code: &str,
        action: &str,
        metadata: Option<serde_json::Value>,
    ) -> ClientResult<()>;

    /// Lists the session's items.
    async fn list_items(&self, code: &str, creds: &Credentials) -> ClientResult<Vec<SessionItem>>;

    /// Sets the session's text.
    async fn upsert_text(
        &self,
        code: &str,
        creds: &Credentials,
        content: &str,
    ) -> ClientResult<SessionItem>;

    /// Uploads a file.
    async fn add_file(
        &self,
        code: &str,
        creds: &Credentials,
        upload: FileUpload,
    ) -> ClientResult<SessionItem>;

    /// Deletes one item.
    async fn remove_item(&self, code: &str, creds: &Credentials, item_id: ItemId)
        -> ClientResult<()>;

    /// Deletes every text item. Returns how many were removed.
    async fn clear_text(&self, code: &str, creds: &Credentials) -> ClientResult<usize>;

    /// Opens the realtime stream.
    async fn subscribe(&self, code: &str, creds: &Credentials) -> ClientResult<EventStream>;
}
