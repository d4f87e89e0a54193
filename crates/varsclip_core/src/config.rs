//! Session service configuration.

use chrono::Duration;

/// Number of PBKDF2 rounds used for session passwords.
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 100_000;

/// Upper bound for a single expiration extension (one week).
pub const MAX_EXTENSION_MINUTES: i64 = 10_080;

/// Maximum size of the shared text, in bytes.
pub const MAX_TEXT_BYTES: usize = 100_000;

/// Maximum size of an uploaded file, in bytes.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration for the session service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lifetime of an issued session token.
    pub token_ttl: Duration,

    /// Lifetime of a signed file URL handed out for protected sessions.
    pub signed_url_ttl: Duration,

    /// Window after creation during which a public session may be protected
    /// without presenting a token.
    pub creation_grace: Duration,

    /// Largest accepted extension, in minutes.
    pub max_extension_minutes: i64,

    /// PBKDF2 iteration count.
    pub password_iterations: u32,

    /// Maximum text content size in bytes.
    pub max_text_bytes: usize,

    /// Maximum upload size in bytes.
    pub max_file_bytes: u64,

    /// Base URL used when building file links (no trailing slash).
    pub public_base_url: String,

    /// Key for signing private file URLs.
    pub url_signing_key: Vec<u8>,

    /// Sessions returned by the admin overview.
    pub admin_session_limit: usize,

    /// Analytics events returned by the admin overview.
    pub admin_activity_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(24),
            signed_url_ttl: Duration::days(7),
            creation_grace: Duration::minutes(5),
            max_extension_minutes: MAX_EXTENSION_MINUTES,
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            max_text_bytes: MAX_TEXT_BYTES,
            max_file_bytes: MAX_FILE_BYTES,
            public_base_url: "http://127.0.0.1:8080".into(),
            url_signing_key: crate::crypto::random_bytes(32),
            admin_session_limit: 200,
            admin_activity_limit: 100,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the token lifetime.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Sets the signed URL lifetime.
    #[must_use]
    pub fn with_signed_url_ttl(mut self, ttl: Duration) -> Self {
        self.signed_url_ttl = ttl;
        self
    }

    /// Sets the creation grace window.
    #[must_use]
    pub fn with_creation_grace(mut self, grace: Duration) -> Self {
        self.creation_grace = grace;
        self
    }

    /// Sets the PBKDF2 iteration count.
    ///
    /// Hashes are not self-describing, so changing this invalidates every
    /// stored password hash.
    #[must_use]
    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations;
        self
    }

    /// Sets the base URL for file links.
    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the URL signing key.
    #[must_use]
    pub fn with_url_signing_key(mut self, key: Vec<u8>) -> Self {
        self.url_signing_key = key;
        self
    }

    /// Sets the maximum text size.
    #[must_use]
    pub fn with_max_text_bytes(mut self, bytes: usize) -> Self {
        self.max_text_bytes = bytes;
        self
    }

    /// Sets the maximum upload size.
    #[must_use]
    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }
}
