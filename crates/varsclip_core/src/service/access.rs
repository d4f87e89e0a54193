//! Create-or-authenticate.

use super::{parse_code, SessionInfo, SessionService};
use crate::crypto::{generate_token, token_digest};
use crate::error::{CoreError, CoreResult};
use crate::types::{Protection, Session, SessionId, TokenRecord};
use crate::validation::{validate_password, MAX_PASSWORD_LEN};
use chrono::{DateTime, Duration, Utc};

/// How [`SessionService::access`] treats an existing or missing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Create the session if the code is unused, otherwise join it.
    #[default]
    CreateOrJoin,
    /// Only create; an existing code is a conflict.
    CreateOnly,
    /// Only join; a missing code is not found.
    VerifyOnly,
}

impl AccessMode {
    /// Maps the optional `isCreating` request flag onto a mode.
    pub fn from_flag(is_creating: Option<bool>) -> Self {
        match is_creating {
            None => AccessMode::CreateOrJoin,
            Some(true) => AccessMode::CreateOnly,
            Some(false) => AccessMode::VerifyOnly,
        }
    }
}

/// A request to create or enter a session.
#[derive(Clone)]
pub struct AccessRequest {
    /// Session code as typed by the user.
    pub code: String,
    /// Password for a new protected session or for joining one.
    pub password: Option<String>,
    /// Create/join behaviour.
    pub mode: AccessMode,
    /// Lifetime of a newly created session. `None` or `<= 0` means forever.
    pub duration_minutes: Option<i64>,
}

impl AccessRequest {
    /// Creates a request for `code` with no password.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            password: None,
            mode: AccessMode::default(),
            duration_minutes: None,
        }
    }

    /// Sets the password. Empty strings count as no password.
    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// Sets the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the lifetime of a newly created session.
    #[must_use]
    pub fn with_duration_minutes(mut self, minutes: Option<i64>) -> Self {
        self.duration_minutes = minutes;
        self
    }
}

impl std::fmt::Debug for AccessRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessRequest")
            .field("code", &self.code)
            .field("password", &self.password.as_ref().map(|_| ".."))
            .field("mode", &self.mode)
            .field("duration_minutes", &self.duration_minutes)
            .finish()
    }
}

/// A freshly issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// The bearer string. Only its digest is stored.
    pub token: String,
    /// When the token stops working.
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a successful [`SessionService::access`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGranted {
    /// Internal session ID.
    pub session_id: SessionId,
    /// Public metadata.
    pub info: SessionInfo,
    /// Token for protected sessions; public sessions never get one.
    pub token: Option<IssuedToken>,
    /// True if this call created the session.
    pub created: bool,
}

impl SessionService {
    /// Creates a session or authenticates against an existing one.
    ///
    /// - unused code: validates the password (if any), creates the
    ///   session and issues a token when it is protected
    /// - public session: succeeds without a token
    /// - protected session: verifies the password and issues a new token
    ///
    /// An expired session is purged first and its code treated as unused.
    ///
    /// # Errors
    ///
    /// - 400 for a malformed code or weak password
    /// - 401 for a missing or wrong password
    /// - 404 in [`AccessMode::VerifyOnly`] when the code is unused
    /// - 409 in [`AccessMode::CreateOnly`] when the code is taken
    pub fn access(&self, request: AccessRequest) -> CoreResult<AccessGranted> {
        let code = parse_code(&request.code)?;
        let now = self.now();

        let existing = match self.store.session_by_code(&code)? {
            Some(session) if session.is_expired(now) => {
                tracing::info!(session = %code, "purging expired session before reuse");
                self.purge(&session)?;
                None
            }
            other => other,
        };

        match (existing, request.mode) {
            (None, AccessMode::VerifyOnly) => Err(CoreError::session_not_found()),
            (None, _) => self.create(code, request.password, request.duration_minutes),
            (Some(_), AccessMode::CreateOnly) => {
                Err(CoreError::Conflict("Session code already exists".into()))
            }
            (Some(session), _) => self.join(session, request.password),
        }
    }

    fn create(
        &self,
        code: crate::types::SessionCode,
        password: Option<String>,
        duration_minutes: Option<i64>,
    ) -> CoreResult<AccessGranted> {
        let now = self.now();
        let expires_at = match duration_minutes.filter(|minutes| *minutes > 0) {
            Some(minutes) => Some(
                Duration::try_minutes(minutes)
                    .and_then(|duration| now.checked_add_signed(duration))
                    .ok_or_else(|| CoreError::validation("Session duration is too long"))?,
            ),
            None => None,
        };
        let protection = match &password {
            Some(password) => {
                validate_password(password)?;
                Protection::Protected {
                    password_hash: self.hasher.hash(password),
                }
            }
            None => Protection::Public,
        };

        let session = Session::new(code, protection, now, expires_at);
        self.store.insert_session(session.clone())?;

        let token = if session.is_public() {
            None
        } else {
            Some(self.issue_token(&session)?)
        };
        tracing::info!(
            session = %session.code,
            public = session.is_public(),
            expires_at = ?session.expires_at,
            "session created"
        );

        Ok(AccessGranted {
            session_id: session.id,
            info: SessionInfo::from(&session),
            token,
            created: true,
        })
    }

    fn join(&self, mut session: Session, password: Option<String>) -> CoreResult<AccessGranted> {
        let token = match session.protection.password_hash() {
            None => None,
            Some(hash) => {
                let password = password.ok_or_else(CoreError::password_required)?;
                if password.chars().count() > MAX_PASSWORD_LEN {
                    return Err(CoreError::validation(
                        "Password must not exceed 128 characters",
                    ));
                }
                if !self.hasher.verify(&password, hash) {
                    tracing::warn!(session = %session.code, "rejected wrong password");
                    return Err(CoreError::unauthorized("Invalid password"));
                }
                Some(self.issue_token(&session)?)
            }
        };
        self.touch(&mut session)?;

        Ok(AccessGranted {
            session_id: session.id,
            info: SessionInfo::from(&session),
            token,
            created: false,
        })
    }

    fn issue_token(&self, session: &Session) -> CoreResult<IssuedToken> {
        let token = generate_token();
        let now = self.now();
        let expires_at = now + self.config.token_ttl;
        self.store.insert_token(TokenRecord {
            digest: token_digest(&token),
            session_id: session.id,
            created_at: now,
            expires_at,
        })?;
        Ok(IssuedToken { token, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Credentials;
    use super::*;
    use crate::clock::Clock;

    #[test]
    fn unused_code_creates_public_session() {
        let h = harness();
        let granted = h.public("frdna");

        assert!(granted.created);
        assert!(granted.info.is_public);
        assert!(granted.token.is_none());
        assert!(granted.info.expires_at.is_none());
        assert_eq!(h.store.token_count(), 0);
    }

    #[test]
    fn protected_creation_issues_token() {
        let h = harness();
        let granted = h.protected("vault");

        assert!(!granted.info.is_public);
        let token = granted.token.unwrap();
        assert_eq!(token.expires_at, h.clock.now() + chrono::Duration::hours(24));
        assert_eq!(h.store.token_count(), 1);
    }

    #[test]
    fn weak_password_rejected_before_creation() {
        let h = harness();
        let err = h
            .service
            .access(AccessRequest::new("vault").with_password(Some("short".into())))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(h.store.session_count(), 0);
    }

    #[test]
    fn malformed_code_rejected() {
        let h = harness();
        let err = h.service.access(AccessRequest::new("ab")).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = h.service.access(AccessRequest::new("admin")).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn join_public_is_trivial() {
        let h = harness();
        h.public("frdna");
        let granted = h
            .service
            .access(AccessRequest::new("frdna").with_password(Some("whatever".into())))
            .unwrap();
        assert!(!granted.created);
        assert!(granted.token.is_none());
    }

    #[test]
    fn join_protected_requires_password() {
        let h = harness();
        h.protected("vault");

        let err = h.service.access(AccessRequest::new("vault")).unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert!(err.requires_password());

        let err = h
            .service
            .access(AccessRequest::new("vault").with_password(Some("WrongPassword9".into())))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid password");
        assert!(!err.requires_password());

        let granted = h
            .service
            .access(AccessRequest::new("vault").with_password(Some(STRONG_PASSWORD.into())))
            .unwrap();
        assert!(granted.token.is_some());
        assert_eq!(h.store.token_count(), 2);
    }

    #[test]
    fn modes() {
        let h = harness();
        let err = h
            .service
            .access(AccessRequest::new("ghost").with_mode(AccessMode::VerifyOnly))
            .unwrap_err();
        assert_eq!(err.status_code(), 404);

        h.public("taken");
        let err = h
            .service
            .access(AccessRequest::new("taken").with_mode(AccessMode::CreateOnly))
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.to_string(), "Session code already exists");

        assert_eq!(AccessMode::from_flag(None), AccessMode::CreateOrJoin);
        assert_eq!(AccessMode::from_flag(Some(true)), AccessMode::CreateOnly);
        assert_eq!(AccessMode::from_flag(Some(false)), AccessMode::VerifyOnly);
    }

    #[test]
    fn conflicting_create_leaves_original_untouched() {
        let h = harness();
        h.protected("vault");
        let before = h.service.session_info("vault").unwrap();

        h.service
            .access(AccessRequest::new("vault").with_mode(AccessMode::CreateOnly))
            .unwrap_err();
        assert_eq!(h.service.session_info("vault").unwrap(), before);
    }

    #[test]
    fn duration_sets_expiry() {
        let h = harness();
        let granted = h
            .service
            .access(AccessRequest::new("brief").with_duration_minutes(Some(30)))
            .unwrap();
        assert_eq!(
            granted.info.expires_at,
            Some(h.clock.now() + chrono::Duration::minutes(30))
        );

        let granted = h
            .service
            .access(AccessRequest::new("forever").with_duration_minutes(Some(0)))
            .unwrap();
        assert!(granted.info.expires_at.is_none());
    }

    #[test]
    fn oversized_duration_is_a_validation_error() {
        let h = harness();
        let err = h
            .service
            .access(AccessRequest::new("bigdur").with_duration_minutes(Some(1_000_000_000_000)))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Session duration is too long");

        let err = h
            .service
            .access(AccessRequest::new("maxdur").with_duration_minutes(Some(i64::MAX)))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(h.store.session_count(), 0);
    }

    #[test]
    fn expired_code_is_reusable() {
        let h = harness();
        h.service
            .access(
                AccessRequest::new("brief")
                    .with_password(Some(STRONG_PASSWORD.into()))
                    .with_duration_minutes(Some(5)),
            )
            .unwrap();
        h.clock.advance(chrono::Duration::minutes(10));

        let granted = h
            .service
            .access(AccessRequest::new("brief").with_mode(AccessMode::CreateOnly))
            .unwrap();
        assert!(granted.created);
        assert!(granted.info.is_public);
        assert_eq!(h.store.token_count(), 0);
    }

    #[test]
    fn tokens_expire() {
        let h = harness();
        let token = h.protected("vault").token.unwrap().token;
        let creds = Credentials::none().with_token(Some(token));
        assert!(h.service.list_items("vault", &creds).is_ok());

        h.clock.advance(chrono::Duration::hours(25));
        let err = h.service.list_items("vault", &creds).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
