//! Server configuration.

use crate::error::{ServerError, ServerResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use varsclip_core::Config;

/// Prefix of every environment variable read by [`ServerConfig::from_env`].
pub const ENV_PREFIX: &str = "VARSCLIP_";

/// Configuration for the varsclip server.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Shared secret for the admin endpoints. Admin access is refused
    /// entirely when unset.
    pub admin_secret: Option<String>,
    /// How often expired sessions are swept.
    pub sweep_interval: Duration,
    /// Directory for uploaded files. Uploads stay in memory when unset.
    pub blob_dir: Option<PathBuf>,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Session service configuration.
    pub core: Config,
}

impl ServerConfig {
    /// Creates a configuration bound to `bind_addr`.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            admin_secret: None,
            sweep_interval: Duration::from_secs(60),
            blob_dir: None,
            // 10 MiB of file, base64-encoded, plus the JSON around it.
            max_body_bytes: 16 * 1024 * 1024,
            core: Config::default(),
        }
    }

    /// Enables the admin endpoints with the given secret.
    #[must_use]
    pub fn with_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = Some(secret.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Sets the sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Stores uploads under `dir`.
    #[must_use]
    pub fn with_blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blob_dir = Some(dir.into());
        self
    }

    /// Sets the maximum request body size.
    #[must_use]
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Replaces the session service configuration.
    #[must_use]
    pub fn with_core(mut self, core: Config) -> Self {
        self.core = core;
        self
    }

    /// Reads configuration from `VARSCLIP_*` environment variables.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `VARSCLIP_BIND` | bind address, e.g. `0.0.0.0:8080` |
    /// | `VARSCLIP_ADMIN_SECRET` | admin shared secret |
    /// | `VARSCLIP_BLOB_DIR` | upload directory |
    /// | `VARSCLIP_PUBLIC_URL` | base URL used in file links |
    /// | `VARSCLIP_SWEEP_SECS` | sweep interval in seconds |
    /// | `VARSCLIP_SIGNING_KEY` | base64 key for signed file links |
    /// | `VARSCLIP_TOKEN_TTL_MINUTES` | bearer token lifetime |
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };

        let mut config = Self::default();
        if let Some(bind) = var("BIND") {
            config.bind_addr = bind
                .parse()
                .map_err(|_| ServerError::Config(format!("invalid bind address: {bind}")))?;
        }
        if let Some(secret) = var("ADMIN_SECRET") {
            config = config.with_admin_secret(secret);
        }
        if let Some(dir) = var("BLOB_DIR") {
            config = config.with_blob_dir(dir);
        }
        if let Some(url) = var("PUBLIC_URL") {
            config.core = config.core.with_public_base_url(url);
        }
        if let Some(secs) = var("SWEEP_SECS") {
            let secs: u64 = parse_number("SWEEP_SECS", &secs)?;
            config.sweep_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(key) = var("SIGNING_KEY") {
            let key = STANDARD
                .decode(key.trim())
                .map_err(|e| ServerError::Config(format!("invalid signing key: {e}")))?;
            if key.len() < 16 {
                return Err(ServerError::Config(
                    "signing key must be at least 16 bytes".into(),
                ));
            }
            config.core = config.core.with_url_signing_key(key);
        }
        if let Some(minutes) = var("TOKEN_TTL_MINUTES") {
            let minutes: i64 = parse_number("TOKEN_TTL_MINUTES", &minutes)?;
            config.core = config
                .core
                .with_token_ttl(chrono::Duration::minutes(minutes.max(1)));
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> ServerResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::Config(format!("{ENV_PREFIX}{name} is not a number: {value}")))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| ".."))
            .field("sweep_interval", &self.sweep_interval)
            .field("blob_dir", &self.blob_dir)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("public_base_url", &self.core.public_base_url)
            .finish_non_exhaustive()
    }
}
