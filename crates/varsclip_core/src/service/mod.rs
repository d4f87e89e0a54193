//! The session service: lifecycle, items, analytics and administration.
//!
//! [`SessionService`] is the single authority over sessions. It validates
//! and authorizes every request before touching the store, and emits a
//! [`ChangeEvent`](crate::ChangeEvent) for every item mutation.
//!
//! All methods are synchronous. Password hashing is deliberately slow, so
//! async callers should run them on a blocking thread.

mod access;
mod analytics;
mod items;
mod lifecycle;

pub use access::{AccessGranted, AccessMode, AccessRequest, IssuedToken};
pub use analytics::{AdminOverview, SessionStats, SessionSummary};
pub use items::FileUpload;
pub use lifecycle::{CleanupReport, SettingsChange};

use crate::blob::{BlobStore, InMemoryBlobStore};
use crate::change_feed::ChangeFeed;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::crypto::{token_digest, PasswordHasher, UrlSigner};
use crate::error::{CoreError, CoreResult};
use crate::store::{InMemoryStore, SessionStore};
use crate::types::{Session, SessionCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Proof of access presented with a request.
///
/// Any one valid credential is enough; the admin flag is set only by
/// callers that have already checked the admin secret.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Bearer token issued by [`SessionService::access`].
    pub token: Option<String>,
    /// Session password.
    pub password: Option<String>,
    /// Caller is an administrator.
    pub admin: bool,
}

impl Credentials {
    /// No credentials.
    pub fn none() -> Self {
        Self::default()
    }

    /// Administrator credentials.
    pub fn admin() -> Self {
        Self {
            admin: true,
            ..Self::default()
        }
    }

    /// Adds a bearer token. Empty strings are ignored.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Adds a password. Empty strings are ignored.
    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// Returns true if nothing was supplied.
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.password.is_none() && !self.admin
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| ".."))
            .field("password", &self.password.as_ref().map(|_| ".."))
            .field("admin", &self.admin)
            .finish()
    }
}

/// Session metadata safe to show to anyone who knows the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session code.
    pub code: SessionCode,
    /// True if no password is required.
    pub is_public: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// Last content interaction.
    pub last_activity: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            code: session.code.clone(),
            is_public: session.is_public(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            last_activity: session.last_activity,
        }
    }
}

/// Session lifecycle and content service.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    feed: ChangeFeed,
    hasher: PasswordHasher,
    signer: UrlSigner,
    config: Config,
}

impl SessionService {
    /// Creates a service over the given stores using wall-clock time.
    pub fn new(store: Arc<dyn SessionStore>, blobs: Arc<dyn BlobStore>, config: Config) -> Self {
        Self::with_clock(store, blobs, Arc::new(SystemClock), config)
    }

    /// Creates a service with an explicit time source.
    pub fn with_clock(
        store: Arc<dyn SessionStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            store,
            blobs,
            clock,
            feed: ChangeFeed::new(),
            hasher: PasswordHasher::new(config.password_iterations),
            signer: UrlSigner::new(config.url_signing_key.clone()),
            config,
        }
    }

    /// Creates a service backed entirely by memory.
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryBlobStore::new()),
            config,
        )
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the change feed.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Returns the current time according to the service clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns public metadata for a live session.
    pub fn session_info(&self, code: &str) -> CoreResult<SessionInfo> {
        let session = self.active_session(&parse_code(code)?)?;
        Ok(SessionInfo::from(&session))
    }

    /// Loads a session that exists and has not expired.
    pub(crate) fn active_session(&self, code: &SessionCode) -> CoreResult<Session> {
        let session = self
            .store
            .session_by_code(code)?
            .ok_or_else(CoreError::session_not_found)?;
        if session.is_expired(self.now()) {
            return Err(CoreError::not_found("Session has expired"));
        }
        Ok(session)
    }

    /// Checks that `creds` grant access to `session`.
    ///
    /// Public sessions admit everyone. Protected sessions accept a live
    /// token for that session or the correct password.
    pub(crate) fn authorize(&self, session: &Session, creds: &Credentials) -> CoreResult<()> {
        if creds.admin || session.is_public() {
            return Ok(());
        }
        if let Some(token) = &creds.token {
            if self.token_is_valid(session, token)? {
                return Ok(());
            }
        }
        if let (Some(password), Some(hash)) = (&creds.password, session.protection.password_hash())
        {
            if self.hasher.verify(password, hash) {
                return Ok(());
            }
            tracing::warn!(session = %session.code, "rejected wrong password");
            return Err(CoreError::unauthorized("Invalid password"));
        }
        if creds.token.is_some() {
            tracing::warn!(session = %session.code, "rejected invalid token");
            return Err(CoreError::unauthorized("Invalid or expired token"));
        }
        Err(CoreError::password_required())
    }

    /// Returns true if `token` is a live token for `session`.
    pub(crate) fn token_is_valid(&self, session: &Session, token: &str) -> CoreResult<bool> {
        let record = self.store.token(&token_digest(token))?;
        Ok(record.is_some_and(|r| r.session_id == session.id && r.is_live(self.now())))
    }

    /// Records a content interaction on the session.
    pub(crate) fn touch(&self, session: &mut Session) -> CoreResult<()> {
        session.last_activity = self.now();
        self.store.update_session(session)?;
        Ok(())
    }
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("hasher", &self.hasher)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

pub(crate) fn parse_code(code: &str) -> CoreResult<SessionCode> {
    SessionCode::parse(code.trim())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn credentials_debug_redacts() {
        let creds = Credentials::none()
            .with_token(Some("secret-token".into()))
            .with_password(Some("hunter2".into()));
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn empty_credentials_ignored() {
        let creds = Credentials::none()
            .with_token(Some(String::new()))
            .with_password(Some(String::new()));
        assert!(creds.is_empty());
    }

    #[test]
    fn authorize_protected() {
        let h = harness();
        let granted = h.protected("vault");
        let session = h.service.active_session(&parse_code("vault").unwrap()).unwrap();
        let token = granted.token.unwrap().token;

        assert!(h
            .service
            .authorize(&session, &Credentials::none().with_token(Some(token)))
            .is_ok());
        assert!(h
            .service
            .authorize(
                &session,
                &Credentials::none().with_password(Some(STRONG_PASSWORD.into()))
            )
            .is_ok());
        assert!(h.service.authorize(&session, &Credentials::admin()).is_ok());

        let err = h
            .service
            .authorize(&session, &Credentials::none())
            .unwrap_err();
        assert!(err.requires_password());

        let err = h
            .service
            .authorize(&session, &Credentials::none().with_token(Some("bogus".into())))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired token");

        let err = h
            .service
            .authorize(
                &session,
                &Credentials::none().with_password(Some("WrongPassword1".into())),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid password");
    }

    #[test]
    fn token_for_other_session_rejected() {
        let h = harness();
        let first = h.protected("first");
        h.protected("second");
        let second = h
            .service
            .active_session(&parse_code("second").unwrap())
            .unwrap();

        let creds = Credentials::none().with_token(Some(first.token.unwrap().token));
        assert!(h.service.authorize(&second, &creds).is_err());
    }

    #[test]
    fn expired_session_hidden() {
        let h = harness();
        h.service
            .access(AccessRequest::new("brief").with_duration_minutes(Some(1)))
            .unwrap();
        assert!(h.service.session_info("brief").is_ok());

        h.clock.advance(chrono::Duration::minutes(2));
        let err = h.service.session_info("brief").unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
