//! Request authentication helpers.
//!
//! Credentials reach the server in three ways:
//! - lifecycle function bodies carry `token` / `password` fields
//! - item endpoints use `Authorization: Bearer <token>` and the
//!   `x-session-password` header
//! - admin endpoints use the `x-admin-secret` header, compared in
//!   constant time against the configured secret

use crate::error::{ServerError, ServerResult};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::HeaderMap;
use varsclip_core::crypto::constant_time_eq;
use varsclip_core::{ClientInfo, Credentials};
use varsclip_protocol::{ADMIN_SECRET_HEADER, PASSWORD_HEADER};

/// Checks the admin shared secret.
#[derive(Clone)]
pub struct AdminGate {
    secret: Option<String>,
}

impl AdminGate {
    /// Creates a gate. With no secret every admin request is refused.
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Returns true if admin access is configured.
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Returns true if the request carries the admin secret.
    pub fn is_admin(&self, headers: &HeaderMap) -> bool {
        let (Some(expected), Some(provided)) = (&self.secret, header_str(headers, ADMIN_SECRET_HEADER))
        else {
            return false;
        };
        constant_time_eq(expected.as_bytes(), provided.as_bytes())
    }

    /// Fails unless the request carries the admin secret.
    pub fn require(&self, headers: &HeaderMap) -> ServerResult<Credentials> {
        if self.is_admin(headers) {
            Ok(Credentials::admin())
        } else {
            tracing::warn!(ip = %client_info(headers).ip_address, "admin request rejected");
            Err(ServerError::AdminUnauthorized)
        }
    }
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Extracts the bearer token from `Authorization`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, AUTHORIZATION.as_str())?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Builds credentials from item endpoint headers.
pub fn header_credentials(headers: &HeaderMap, admin: &AdminGate) -> Credentials {
    let creds = Credentials::none()
        .with_token(bearer_token(headers))
        .with_password(header_str(headers, PASSWORD_HEADER).map(str::to_string));
    Credentials {
        admin: admin.is_admin(headers),
        ..creds
    }
}

/// Identifies the caller for analytics.
///
/// The IP is the first `x-forwarded-for` entry, else `x-real-ip`, else
/// `unknown`.
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let ip = header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip").map(str::trim))
        .unwrap_or("unknown");
    let user_agent = header_str(headers, USER_AGENT.as_str()).unwrap_or("unknown");
    ClientInfo::new(ip, user_agent)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn admin_gate() {
        let gate = AdminGate::new(Some("s3cret".into()));
        assert!(gate.is_admin(&headers(&[("x-admin-secret", "s3cret")])));
        assert!(!gate.is_admin(&headers(&[("x-admin-secret", "s3cre")])));
        assert!(!gate.is_admin(&headers(&[])));
        assert!(gate.require(&headers(&[])).is_err());
        assert!(gate.require(&headers(&[("x-admin-secret", "s3cret")])).unwrap().admin);
    }

    #[test]
    fn disabled_gate_refuses_everything() {
        let gate = AdminGate::new(None);
        assert!(!gate.is_enabled());
        assert!(!gate.is_admin(&headers(&[("x-admin-secret", "")])));
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(
            bearer_token(&headers(&[("authorization", "Bearer abc123")])),
            Some("abc123".into())
        );
        assert_eq!(
            bearer_token(&headers(&[("authorization", "bearer abc123")])),
            Some("abc123".into())
        );
        assert_eq!(bearer_token(&headers(&[("authorization", "Basic abc")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer ")])), None);
        assert_eq!(bearer_token(&headers(&[])), None);
    }

    #[test]
    fn header_credentials_collects_everything() {
        let gate = AdminGate::new(None);
        let creds = header_credentials(
            &headers(&[
                ("authorization", "Bearer tok"),
                ("x-session-password", "CorrectHorse42"),
            ]),
            &gate,
        );
        assert_eq!(creds.token.as_deref(), Some("tok"));
        assert_eq!(creds.password.as_deref(), Some("CorrectHorse42"));
        assert!(!creds.admin);
    }

    #[test]
    fn client_ip_resolution() {
        let info = client_info(&headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
            ("user-agent", "curl/8"),
        ]));
        assert_eq!(info.ip_address, "203.0.113.7");
        assert_eq!(info.user_agent, "curl/8");

        let info = client_info(&headers(&[("x-real-ip", "10.0.0.2")]));
        assert_eq!(info.ip_address, "10.0.0.2");

        let info = client_info(&headers(&[]));
        assert_eq!(info, ClientInfo::default());
    }
}
