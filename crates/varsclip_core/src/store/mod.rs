//! Record storage for sessions, items, tokens, access grants and analytics.

mod memory;

pub use memory::InMemoryStore;

use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use crate::types::{
    AccessGrant, AnalyticsEvent, ItemId, Session, SessionCode, SessionId, SessionItem, TokenRecord,
};

/// Persistent state behind the session service.
///
/// Stores are plain record keepers: they enforce only uniqueness of session
/// codes. Authorization and validation live in
/// [`SessionService`](crate::SessionService).
///
/// # Invariants
///
/// - `insert_session` fails with [`CoreError::Conflict`](crate::CoreError)
///   if the code is taken, without touching the existing row
/// - every `delete_*` call tolerates rows that are already gone
/// - `items_for_session` returns items ordered by position, then creation
///   time
/// - implementations must be `Send + Sync`
pub trait SessionStore: Send + Sync {
    /// Inserts a new session, rejecting duplicate codes.
    fn insert_session(&self, session: Session) -> CoreResult<()>;

    /// Looks a session up by code.
    fn session_by_code(&self, code: &SessionCode) -> CoreResult<Option<Session>>;

    /// Looks a session up by ID.
    fn session(&self, id: SessionId) -> CoreResult<Option<Session>>;

    /// Replaces a session row. Returns false if it no longer exists.
    fn update_session(&self, session: &Session) -> CoreResult<bool>;

    /// Removes a session row. Returns false if it was already gone.
    fn delete_session(&self, id: SessionId) -> CoreResult<bool>;

    /// Returns up to `limit` sessions, newest first.
    fn list_sessions(&self, limit: usize) -> CoreResult<Vec<Session>>;

    /// Inserts a new item.
    fn insert_item(&self, item: SessionItem) -> CoreResult<()>;

    /// Replaces an item. Returns false if it no longer exists.
    fn update_item(&self, item: &SessionItem) -> CoreResult<bool>;

    /// Looks an item up by ID.
    fn item(&self, id: ItemId) -> CoreResult<Option<SessionItem>>;

    /// Returns the items of a session in display order.
    fn items_for_session(&self, session_id: SessionId) -> CoreResult<Vec<SessionItem>>;

    /// Removes an item, returning it if it existed.
    fn delete_item(&self, id: ItemId) -> CoreResult<Option<SessionItem>>;

    /// Removes all items of a session, returning them.
    fn delete_items_for_session(&self, session_id: SessionId) -> CoreResult<Vec<SessionItem>>;

    /// Stores a token record.
    fn insert_token(&self, token: TokenRecord) -> CoreResult<()>;

    /// Looks a token up by digest.
    fn token(&self, digest: &[u8; 32]) -> CoreResult<Option<TokenRecord>>;

    /// Removes every token of a session. Returns how many were removed.
    fn delete_tokens_for_session(&self, session_id: SessionId) -> CoreResult<usize>;

    /// Removes tokens that expired at or before `now`.
    fn delete_expired_tokens(&self, now: DateTime<Utc>) -> CoreResult<usize>;

    /// Stores an access grant, replacing an identical one.
    fn insert_access(&self, grant: AccessGrant) -> CoreResult<()>;

    /// Returns true if `email` has been granted access to the session.
    fn has_access(&self, session_id: SessionId, email: &str) -> CoreResult<bool>;

    /// Removes every access grant of a session.
    fn delete_access_for_session(&self, session_id: SessionId) -> CoreResult<usize>;

    /// Appends an analytics event.
    fn insert_event(&self, event: AnalyticsEvent) -> CoreResult<()>;

    /// Returns the analytics events of a session, oldest first.
    fn events_for_session(&self, session_id: SessionId) -> CoreResult<Vec<AnalyticsEvent>>;

    /// Returns up to `limit` analytics events across sessions, newest first.
    fn recent_events(&self, limit: usize) -> CoreResult<Vec<AnalyticsEvent>>;

    /// Removes the analytics events of a session.
    fn delete_events_for_session(&self, session_id: SessionId) -> CoreResult<usize>;
}
