//! In-memory session store.

use super::SessionStore;
use crate::error::{CoreError, CoreResult};
use crate::types::{
    AccessGrant, AnalyticsEvent, ItemId, Session, SessionCode, SessionId, SessionItem, TokenRecord,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<SessionId, Session>,
    codes: HashMap<SessionCode, SessionId>,
    items: HashMap<ItemId, SessionItem>,
    tokens: HashMap<[u8; 32], TokenRecord>,
    access: Vec<AccessGrant>,
    events: Vec<AnalyticsEvent>,
}

/// A session store that keeps every table in memory.
///
/// Suitable for:
/// - Tests
/// - Single-process deployments where sessions are ephemeral anyway
///
/// All tables sit behind one lock, so the code uniqueness check and the
/// insert that follows it are atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.tables.read().sessions.len()
    }

    /// Returns the number of stored tokens.
    pub fn token_count(&self) -> usize {
        self.tables.read().tokens.len()
    }
}

impl SessionStore for InMemoryStore {
    fn insert_session(&self, session: Session) -> CoreResult<()> {
        let mut tables = self.tables.write();
        if tables.codes.contains_key(&session.code) {
            return Err(CoreError::Conflict("Session code already exists".into()));
        }
        tables.codes.insert(session.code.clone(), session.id);
        tables.sessions.insert(session.id, session);
        Ok(())
    }

    fn session_by_code(&self, code: &SessionCode) -> CoreResult<Option<Session>> {
        let tables = self.tables.read();
        Ok(tables
            .codes
            .get(code)
            .and_then(|id| tables.sessions.get(id))
            .cloned())
    }

    fn session(&self, id: SessionId) -> CoreResult<Option<Session>> {
        Ok(self.tables.read().sessions.get(&id).cloned())
    }

    fn update_session(&self, session: &Session) -> CoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_session(&self, id: SessionId) -> CoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.sessions.remove(&id) {
            Some(session) => {
                tables.codes.remove(&session.code);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_sessions(&self, limit: usize) -> CoreResult<Vec<Session>> {
        let tables = self.tables.read();
        let mut sessions: Vec<Session> = tables.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    fn insert_item(&self, item: SessionItem) -> CoreResult<()> {
        self.tables.write().items.insert(item.id, item);
        Ok(())
    }

    fn update_item(&self, item: &SessionItem) -> CoreResult<bool> {
        let mut tables = self.tables.write();
        match tables.items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn item(&self, id: ItemId) -> CoreResult<Option<SessionItem>> {
        Ok(self.tables.read().items.get(&id).cloned())
    }

    fn items_for_session(&self, session_id: SessionId) -> CoreResult<Vec<SessionItem>> {
        let tables = self.tables.read();
        let mut items: Vec<SessionItem> = tables
            .items
            .values()
            .filter(|item| item.session_id == session_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(items)
    }

    fn delete_item(&self, id: ItemId) -> CoreResult<Option<SessionItem>> {
        Ok(self.tables.write().items.remove(&id))
    }

    fn delete_items_for_session(&self, session_id: SessionId) -> CoreResult<Vec<SessionItem>> {
        let mut tables = self.tables.write();
        let ids: Vec<ItemId> = tables
            .items
            .values()
            .filter(|item| item.session_id == session_id)
            .map(|item| item.id)
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| tables.items.remove(&id))
            .collect())
    }

    fn insert_token(&self, token: TokenRecord) -> CoreResult<()> {
        self.tables.write().tokens.insert(token.digest, token);
        Ok(())
    }

    fn token(&self, digest: &[u8; 32]) -> CoreResult<Option<TokenRecord>> {
        Ok(self.tables.read().tokens.get(digest).cloned())
    }

    fn delete_tokens_for_session(&self, session_id: SessionId) -> CoreResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.tokens.len();
        tables.tokens.retain(|_, t| t.session_id != session_id);
        Ok(before - tables.tokens.len())
    }

    fn delete_expired_tokens(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.tokens.len();
        tables.tokens.retain(|_, t| t.is_live(now));
        Ok(before - tables.tokens.len())
    }

    fn insert_access(&self, grant: AccessGrant) -> CoreResult<()> {
        let mut tables = self.tables.write();
        tables
            .access
            .retain(|g| !(g.session_id == grant.session_id && g.email == grant.email));
        tables.access.push(grant);
        Ok(())
    }

    fn has_access(&self, session_id: SessionId, email: &str) -> CoreResult<bool> {
        Ok(self
            .tables
            .read()
            .access
            .iter()
            .any(|g| g.session_id == session_id && g.email == email))
    }

    fn delete_access_for_session(&self, session_id: SessionId) -> CoreResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.access.len();
        tables.access.retain(|g| g.session_id != session_id);
        Ok(before - tables.access.len())
    }

    fn insert_event(&self, event: AnalyticsEvent) -> CoreResult<()> {
        self.tables.write().events.push(event);
        Ok(())
    }

    fn events_for_session(&self, session_id: SessionId) -> CoreResult<Vec<AnalyticsEvent>> {
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }

    fn recent_events(&self, limit: usize) -> CoreResult<Vec<AnalyticsEvent>> {
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn delete_events_for_session(&self, session_id: SessionId) -> CoreResult<usize> {
        let mut tables = self.tables.write();
        let before = tables.events.len();
        tables.events.retain(|e| e.session_id != session_id);
        Ok(before - tables.events.len())
    }
}
