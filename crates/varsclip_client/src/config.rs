//! Client configuration.

use std::time::Duration;

/// Configuration for the HTTP backend.
#[derive(Clone)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://127.0.0.1:8080`.
    pub server_url: String,
    /// Timeout for a single request. Event streams are exempt.
    pub timeout: Duration,
    /// Sent as the user agent.
    pub client_label: String,
    /// Admin secret attached to every request when set.
    pub admin_secret: Option<String>,
}

impl ClientConfig {
    /// Creates a configuration for `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            client_label: format!("varsclip-client/{}", env!("CARGO_PKG_VERSION")),
            admin_secret: None,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_client_label(mut self, label: impl Into<String>) -> Self {
        self.client_label = label.into();
        self
    }

    /// Sends the admin secret with every request.
    #[must_use]
    pub fn with_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = Some(secret.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Joins `path` onto the server URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("timeout", &self.timeout)
            .field("client_label", &self.client_label)
            .field("admin", &self.admin_secret.is_some())
            .finish()
    }
}
