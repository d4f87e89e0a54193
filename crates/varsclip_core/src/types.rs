//! Core domain types: sessions, items, tokens, access grants and analytics.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier of a session item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generates a new random item ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ItemId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::validation("Invalid item id"))
    }
}

/// A validated, human-readable session code.
///
/// Construction goes through [`SessionCode::parse`], so a value of this type
/// always matches `^[a-z0-9]{4,20}$` and is not a reserved word.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Validates and wraps a session code.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] describing the first violated rule.
    pub fn parse(code: impl Into<String>) -> Result<Self, CoreError> {
        let code = code.into();
        crate::validation::validate_session_code(&code)?;
        Ok(Self(code))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protection status of a session.
///
/// A session is protected exactly when it carries a password hash, so the
/// two are stored together.
#[derive(Clone, PartialEq, Eq)]
pub enum Protection {
    /// Anyone knowing the code may read and write.
    Public,
    /// Access requires the password or a token derived from it.
    Protected {
        /// Salted hash in `base64(salt):base64(digest)` form.
        password_hash: String,
    },
}

impl Protection {
    /// Returns true for public sessions.
    pub fn is_public(&self) -> bool {
        matches!(self, Protection::Public)
    }

    /// Returns the stored hash, if protected.
    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Protection::Public => None,
            Protection::Protected { password_hash } => Some(password_hash),
        }
    }
}

impl fmt::Debug for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protection::Public => f.write_str("Public"),
            Protection::Protected { .. } => f.write_str("Protected { .. }"),
        }
    }
}

/// A shared clipboard identified by its code.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Row identifier.
    pub id: SessionId,
    /// Human-readable code.
    pub code: SessionCode,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optional absolute expiration.
    pub expires_at: Option<DateTime<Utc>>,
    /// Last content interaction.
    pub last_activity: DateTime<Utc>,
    /// Public or password-protected.
    pub protection: Protection,
}

impl Session {
    /// Creates a new session record.
    pub fn new(
        code: SessionCode,
        protection: Protection,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            code,
            created_at: now,
            expires_at,
            last_activity: now,
            protection,
        }
    }

    /// Returns true for public sessions.
    pub fn is_public(&self) -> bool {
        self.protection.is_public()
    }

    /// Returns true if the session has an expiry at or before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Kind of content an item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Inline text.
    Text,
    /// Uploaded image.
    Image,
    /// Any other uploaded file.
    File,
}

impl ItemKind {
    /// Picks `Image` for `image/*` MIME types and `File` otherwise.
    pub fn for_mime_type(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            ItemKind::Image
        } else {
            ItemKind::File
        }
    }
}

/// Reference to a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Public or signed download URL.
    pub url: String,
    /// Original file name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Declared MIME type.
    pub mime_type: String,
    /// Path inside the blob store.
    pub storage_path: String,
}

/// One unit of shared content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    /// Item identifier.
    pub id: ItemId,
    /// Owning session.
    pub session_id: SessionId,
    /// Content kind.
    pub kind: ItemKind,
    /// Inline text, for text items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Stored upload, for image and file items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    /// Insertion order.
    pub position: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl SessionItem {
    /// Creates a text item.
    pub fn text(session_id: SessionId, content: String, position: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            session_id,
            kind: ItemKind::Text,
            content: Some(content),
            file: None,
            position,
            created_at: now,
        }
    }

    /// Creates an image or file item.
    pub fn upload(session_id: SessionId, file: FileRef, position: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            session_id,
            kind: ItemKind::for_mime_type(&file.mime_type),
            content: None,
            file: Some(file),
            position,
            created_at: now,
        }
    }

    /// Bytes this item contributes to session statistics.
    pub fn data_bytes(&self) -> u64 {
        let file = self.file.as_ref().map_or(0, |f| f.size);
        let text = self.content.as_ref().map_or(0, |c| c.len() as u64);
        file + text
    }
}

/// A stored bearer token, keyed by the digest of its secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// SHA-256 digest of the bearer string.
    pub digest: [u8; 32],
    /// Session the token grants access to.
    pub session_id: SessionId,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Returns true if the token is still valid at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// An email-scoped access grant for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    /// Session the grant belongs to.
    pub session_id: SessionId,
    /// Normalised (lowercase) email.
    pub email: String,
    /// Grant time.
    pub created_at: DateTime<Utc>,
}

/// Caller details recorded with analytics events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Caller IP address, or `"unknown"`.
    pub ip_address: String,
    /// Caller user agent, or `"unknown"`.
    pub user_agent: String,
}

impl ClientInfo {
    /// Creates client info from raw values.
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new("unknown", "unknown")
    }
}

/// An append-only analytics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    /// Event identifier.
    pub id: Uuid,
    /// Session the event relates to.
    pub session_id: SessionId,
    /// Action name, e.g. `session_accessed`.
    pub action: String,
    /// Caller IP.
    pub ip_address: String,
    /// Caller user agent.
    pub user_agent: String,
    /// Free-form JSON metadata.
    pub metadata: serde_json::Value,
    /// Record time.
    pub created_at: DateTime<Utc>,
}
