//! Extension, settings changes and deletion.

use super::{parse_code, Credentials, SessionInfo, SessionService};
use crate::error::{CoreError, CoreResult};
use crate::types::{Protection, Session};
use crate::validation::{validate_extension, validate_password};
use chrono::Duration;

/// A change to a session's protection.
#[derive(Clone, PartialEq, Eq)]
pub enum SettingsChange {
    /// Set or replace the password, making the session protected.
    SetPassword(String),
    /// Remove the password, making the session public.
    ClearPassword,
    /// Make the session public. Same effect as clearing the password.
    MakePublic,
}

impl SettingsChange {
    /// Interprets the `newPassword` / `makePublic` request fields.
    ///
    /// An empty new password clears it. A password takes precedence over
    /// the visibility flag.
    pub fn from_request(new_password: Option<String>, make_public: Option<bool>) -> CoreResult<Self> {
        match (new_password, make_public) {
            (Some(password), _) if password.is_empty() => Ok(SettingsChange::ClearPassword),
            (Some(password), _) => Ok(SettingsChange::SetPassword(password)),
            (None, Some(true)) => Ok(SettingsChange::MakePublic),
            (None, Some(false)) => Err(CoreError::validation(
                "To make a session private, you must set a password",
            )),
            (None, None) => Err(CoreError::validation("No settings to update")),
        }
    }
}

impl std::fmt::Debug for SettingsChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsChange::SetPassword(_) => f.write_str("SetPassword(..)"),
            SettingsChange::ClearPassword => f.write_str("ClearPassword"),
            SettingsChange::MakePublic => f.write_str("MakePublic"),
        }
    }
}

/// What a delete cascade removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Stored files removed.
    pub files: usize,
    /// Items removed.
    pub items: usize,
    /// Tokens revoked.
    pub tokens: usize,
    /// Access grants removed.
    pub access_grants: usize,
    /// Analytics events removed.
    pub events: usize,
}

impl SessionService {
    /// Pushes a session's expiry back by `minutes`.
    ///
    /// The extension is added to the current deadline, not to now, so
    /// repeated calls compose.
    ///
    /// # Errors
    ///
    /// - 400 if `minutes` is outside `1..=max_extension_minutes` or the
    ///   session never expires
    /// - 401 without valid credentials for a protected session
    /// - 404 if the session does not exist
    pub fn extend(&self, code: &str, creds: &Credentials, minutes: i64) -> CoreResult<SessionInfo> {
        validate_extension(minutes, self.config.max_extension_minutes)?;
        let mut session = self.active_session(&parse_code(code)?)?;
        self.authorize(&session, creds)?;

        let current = session
            .expires_at
            .ok_or_else(|| CoreError::validation("Session does not have an expiration time"))?;
        let extended = Duration::try_minutes(minutes)
            .and_then(|duration| current.checked_add_signed(duration))
            .ok_or_else(|| CoreError::validation("Session duration is too long"))?;
        session.expires_at = Some(extended);
        self.store.update_session(&session)?;

        tracing::info!(session = %session.code, minutes, expires_at = %extended, "session extended");
        Ok(SessionInfo::from(&session))
    }

    /// Changes a session's password or visibility.
    ///
    /// Every change revokes all outstanding tokens of the session.
    ///
    /// Authorization:
    /// - protected sessions need a live token (or admin)
    /// - setting a password on a public session is allowed only within
    ///   the creation grace window (or for admin)
    /// - other changes on a public session need nothing
    pub fn update_settings(
        &self,
        code: &str,
        creds: &Credentials,
        change: SettingsChange,
    ) -> CoreResult<SessionInfo> {
        let mut session = self.active_session(&parse_code(code)?)?;
        self.authorize_settings(&session, creds, &change)?;

        session.protection = match change {
            SettingsChange::SetPassword(password) => {
                validate_password(&password)?;
                Protection::Protected {
                    password_hash: self.hasher.hash(&password),
                }
            }
            SettingsChange::ClearPassword | SettingsChange::MakePublic => Protection::Public,
        };
        let revoked = self.store.delete_tokens_for_session(session.id)?;
        if !self.store.update_session(&session)? {
            return Err(CoreError::session_not_found());
        }

        tracing::info!(
            session = %session.code,
            public = session.is_public(),
            revoked,
            "session settings updated"
        );
        Ok(SessionInfo::from(&session))
    }

    fn authorize_settings(
        &self,
        session: &Session,
        creds: &Credentials,
        change: &SettingsChange,
    ) -> CoreResult<()> {
        if creds.admin {
            return Ok(());
        }
        if !session.is_public() {
            let valid = match &creds.token {
                Some(token) => self.token_is_valid(session, token)?,
                None => false,
            };
            if !valid {
                tracing::warn!(session = %session.code, "settings change without token");
                return Err(CoreError::unauthorized(
                    "Token required for protected sessions",
                ));
            }
            return Ok(());
        }
        if matches!(change, SettingsChange::SetPassword(_)) {
            let age = self.now() - session.created_at;
            if age > self.config.creation_grace {
                tracing::warn!(session = %session.code, "password set outside grace window");
                return Err(CoreError::unauthorized(
                    "Cannot add password protection without valid session access",
                ));
            }
        }
        Ok(())
    }

    /// Deletes a session and everything that belongs to it.
    ///
    /// Expired sessions can be deleted by anyone. A live session needs the
    /// same authorization as any other operation: admin, a valid token or
    /// password, or nothing at all when it is public.
    ///
    /// # Errors
    ///
    /// - 400 if the session is live, the caller is not authorized and
    ///   `force` is false
    /// - 401 if forced without valid credentials
    /// - 404 if the session does not exist
    pub fn delete_session(
        &self,
        code: &str,
        creds: &Credentials,
        force: bool,
    ) -> CoreResult<CleanupReport> {
        let code = parse_code(code)?;
        let session = self
            .store
            .session_by_code(&code)?
            .ok_or_else(CoreError::session_not_found)?;

        if !session.is_expired(self.now()) {
            if let Err(e) = self.authorize(&session, creds) {
                if !force {
                    return Err(CoreError::validation("Session has not expired yet"));
                }
                return Err(e);
            }
        }
        self.purge(&session)
    }

    /// Deletes every expired session and prunes expired tokens. Returns
    /// how many sessions were removed.
    pub fn sweep_expired(&self) -> CoreResult<usize> {
        let now = self.now();
        let pruned = self.store.delete_expired_tokens(now)?;
        if pruned > 0 {
            tracing::debug!(pruned, "expired tokens pruned");
        }
        let expired: Vec<Session> = self
            .store
            .list_sessions(usize::MAX)?
            .into_iter()
            .filter(|s| s.is_expired(now))
            .collect();

        let mut removed = 0;
        for session in &expired {
            match self.purge(session) {
                Ok(_) => removed += 1,
                Err(e) => {
                    tracing::error!(session = %session.code, error = %e, "sweep failed");
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, "expired sessions swept");
        }
        Ok(removed)
    }

    /// Runs the delete cascade: files, items, tokens, access grants,
    /// analytics, then the session row.
    ///
    /// Steps before the last tolerate failures so one broken row does not
    /// keep the session alive.
    pub(crate) fn purge(&self, session: &Session) -> CoreResult<CleanupReport> {
        let mut report = CleanupReport::default();

        let items = self.store.items_for_session(session.id).unwrap_or_else(|e| {
            tracing::error!(session = %session.code, error = %e, "listing items failed");
            Vec::new()
        });
        for file in items.iter().filter_map(|item| item.file.as_ref()) {
            match self.blobs.delete(&file.storage_path) {
                Ok(true) => report.files += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(path = %file.storage_path, error = %e, "deleting file failed");
                }
            }
        }

        report.items = self
            .store
            .delete_items_for_session(session.id)
            .map(|removed| removed.len())
            .unwrap_or_else(|e| log_step(session, "items", &e));
        report.tokens = self
            .store
            .delete_tokens_for_session(session.id)
            .unwrap_or_else(|e| log_step(session, "tokens", &e));
        report.access_grants = self
            .store
            .delete_access_for_session(session.id)
            .unwrap_or_else(|e| log_step(session, "access grants", &e));
        report.events = self
            .store
            .delete_events_for_session(session.id)
            .unwrap_or_else(|e| log_step(session, "analytics", &e));

        self.store.delete_session(session.id)?;
        self.feed.close_session(session.id);

        tracing::info!(
            session = %session.code,
            files = report.files,
            items = report.items,
            tokens = report.tokens,
            "session deleted"
        );
        Ok(report)
    }
}

fn log_step(session: &Session, step: &str, error: &CoreError) -> usize {
    tracing::error!(session = %session.code, step, error = %error, "cleanup step failed");
    0
}
