//! Request and response bodies.
//!
//! Field names are camelCase on the wire. Every successful lifecycle
//! response carries `success: true`; failures use [`ErrorBody`].

use crate::error::ProtocolResult;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use varsclip_core::{
    AccessGranted, CleanupReport, CoreError, FileUpload, SessionId, SessionInfo, SessionItem,
};

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Set when the session exists but a password must be supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_password: Option<bool>,
}

impl ErrorBody {
    /// Creates a body with just a message.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            requires_password: None,
        }
    }

    /// Builds the body a core error is reported with.
    ///
    /// Server-side failures are reported generically.
    pub fn from_core(err: &CoreError) -> Self {
        if err.is_server_error() {
            return Self::new("Internal server error");
        }
        Self {
            error: err.to_string(),
            requires_password: err.requires_password().then_some(true),
        }
    }
}

/// `verify-session-password` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionRequest {
    /// Session code.
    pub session_code: String,
    /// Password to create with or to join with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// `true`: create only, `false`: join only, absent: either.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_creating: Option<bool>,
    /// Lifetime of a newly created session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
}

/// `verify-session-password` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionResponse {
    /// Always true.
    pub success: bool,
    /// Internal session ID.
    pub session_id: SessionId,
    /// True if no password is required.
    pub is_public: bool,
    /// True if this request created the session.
    pub created: bool,
    /// Bearer token for protected sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// When the token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    /// When the session expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<AccessGranted> for VerifySessionResponse {
    fn from(granted: AccessGranted) -> Self {
        let (token, token_expires_at) = match granted.token {
            Some(issued) => (Some(issued.token), Some(issued.expires_at)),
            None => (None, None),
        };
        Self {
            success: true,
            session_id: granted.session_id,
            is_public: granted.info.is_public,
            created: granted.created,
            token,
            token_expires_at,
            expires_at: granted.info.expires_at,
        }
    }
}

/// `extend-session` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendSessionRequest {
    /// Session code.
    pub session_code: String,
    /// Minutes to add to the current expiry.
    pub extend_minutes: i64,
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Session password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// `extend-session` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendSessionResponse {
    /// Always true.
    pub success: bool,
    /// Confirmation message.
    pub message: String,
    /// New expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// `update-session-settings` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    /// Session code.
    pub session_code: String,
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// New password; empty clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
    /// Visibility change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make_public: Option<bool>,
}

/// `update-session-settings` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsResponse {
    /// Always true.
    pub success: bool,
    /// Confirmation message.
    pub message: String,
    /// Visibility after the change.
    pub is_public: bool,
}

/// `cleanup-expired-session` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSessionRequest {
    /// Session code.
    pub session_code: String,
    /// Explicit delete of a live session. Unauthorized forced calls get
    /// 401 instead of "not expired yet".
    #[serde(default)]
    pub force_delete: bool,
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Session password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// `cleanup-expired-session` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSessionResponse {
    /// Always true.
    pub success: bool,
    /// Confirmation message.
    pub message: String,
    /// Stored files removed.
    pub files: usize,
    /// Items removed.
    pub items: usize,
}

impl From<CleanupReport> for CleanupSessionResponse {
    fn from(report: CleanupReport) -> Self {
        Self {
            success: true,
            message: "Session deleted successfully".into(),
            files: report.files,
            items: report.items,
        }
    }
}

/// `track-analytics` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackAnalyticsRequest {
    /// Session code.
    pub session_code: String,
    /// Action name, e.g. `session_accessed`.
    pub action: String,
    /// Free-form JSON object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Bare success acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Always true.
    pub success: bool,
}

impl SuccessResponse {
    /// The acknowledgement.
    pub const OK: Self = Self { success: true };
}

/// `GET /sessions/{code}` response.
pub type SessionInfoResponse = SessionInfo;

/// Item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsResponse {
    /// Items in display order.
    pub items: Vec<SessionItem>,
}

/// Text upsert request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertTextRequest {
    /// New text.
    pub content: String,
}

/// File upload request. The payload travels base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    /// Original file name.
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Base64 (standard alphabet) file contents.
    pub data: String,
}

impl UploadFileRequest {
    /// Encodes an upload for the wire.
    pub fn from_upload(upload: &FileUpload) -> Self {
        Self {
            name: upload.name.clone(),
            mime_type: upload.mime_type.clone(),
            data: STANDARD.encode(&upload.data),
        }
    }

    /// Decodes the payload.
    pub fn into_upload(self) -> ProtocolResult<FileUpload> {
        let data = STANDARD.decode(self.data.as_bytes())?;
        Ok(FileUpload::new(self.name, self.mime_type, data))
    }
}

/// Text clear response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearTextResponse {
    /// Text items removed.
    pub removed: usize,
}

/// Access grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantAccessRequest {
    /// Email to grant access to.
    pub email: String,
}

/// Access check response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasAccessResponse {
    /// True if the email has been granted access.
    pub has_access: bool,
}
