//! Serve command implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use varsclip_server::{ServerConfig, VarsclipServer};

/// Flags that override the `VARSCLIP_*` environment.
#[derive(Debug, Default)]
pub struct ServeOptions {
    /// Listen address.
    pub bind: Option<SocketAddr>,
    /// Admin secret.
    pub admin_secret: Option<String>,
    /// Upload directory.
    pub blob_dir: Option<PathBuf>,
    /// Base URL for file links.
    pub public_url: Option<String>,
    /// Sweep interval in seconds.
    pub sweep_secs: Option<u64>,
}

impl ServeOptions {
    /// Applies the flags on top of `config`.
    pub fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(secret) = self.admin_secret {
            config = config.with_admin_secret(secret);
        }
        if let Some(dir) = self.blob_dir {
            config = config.with_blob_dir(dir);
        }
        if let Some(url) = self.public_url {
            config.core = config.core.with_public_base_url(url);
        }
        if let Some(secs) = self.sweep_secs {
            config = config.with_sweep_interval(Duration::from_secs(secs.max(1)));
        }
        config
    }
}

/// Runs the server until Ctrl-C.
pub async fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.apply(ServerConfig::from_env()?);
    if config.admin_secret.is_none() {
        tracing::warn!("no admin secret configured, admin endpoints are disabled");
    }
    if std::env::var_os("VARSCLIP_SIGNING_KEY").is_none() {
        tracing::warn!("no signing key configured, signed file links will not survive a restart");
    }

    let server = VarsclipServer::new(config)?;
    let listener = server.bind().await?;
    server
        .serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let options = ServeOptions {
            bind: Some("0.0.0.0:9999".parse().unwrap()),
            admin_secret: Some("s3cret".into()),
            public_url: Some("https://clip.example".into()),
            sweep_secs: Some(0),
            ..ServeOptions::default()
        };
        let config = options.apply(ServerConfig::default());

        assert_eq!(config.bind_addr.port(), 9999);
        assert_eq!(config.admin_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.core.public_base_url, "https://clip.example");
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert!(config.blob_dir.is_none());
    }

    #[test]
    fn no_flags_keep_config() {
        let base = ServerConfig::default().with_admin_secret("env-secret");
        let config = ServeOptions::default().apply(base);
        assert_eq!(config.admin_secret.as_deref(), Some("env-secret"));
    }
}
