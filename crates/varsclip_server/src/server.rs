//! HTTP server assembly.

use crate::auth::AdminGate;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{self, AppState};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use varsclip_core::{BlobStore, FileBlobStore, InMemoryBlobStore, InMemoryStore, SessionService};
use varsclip_protocol::routes;

/// The varsclip HTTP server.
///
/// ```no_run
/// use varsclip_server::{ServerConfig, VarsclipServer};
///
/// # async fn run() -> varsclip_server::ServerResult<()> {
/// let server = VarsclipServer::new(ServerConfig::default())?;
/// let listener = server.bind().await?;
/// server.serve(listener).await
/// # }
/// ```
pub struct VarsclipServer {
    config: ServerConfig,
    service: Arc<SessionService>,
}

impl VarsclipServer {
    /// Creates a server with in-memory session storage.
    ///
    /// Uploads go to `config.blob_dir` when set.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let blobs: Arc<dyn BlobStore> = match &config.blob_dir {
            Some(dir) => Arc::new(FileBlobStore::open(dir)?),
            None => Arc::new(InMemoryBlobStore::new()),
        };
        let service = SessionService::new(Arc::new(InMemoryStore::new()), blobs, config.core.clone());
        Ok(Self::with_service(config, Arc::new(service)))
    }

    /// Creates a server over an existing service.
    pub fn with_service(config: ServerConfig, service: Arc<SessionService>) -> Self {
        Self { config, service }
    }

    /// Returns the session service.
    pub fn service(&self) -> &Arc<SessionService> {
        &self.service
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        let state = AppState::new(
            Arc::clone(&self.service),
            AdminGate::new(self.config.admin_secret.clone()),
        );
        Router::new()
            .route(routes::VERIFY_SESSION_PASSWORD, post(handler::verify_session_password))
            .route(routes::EXTEND_SESSION, post(handler::extend_session))
            .route(routes::UPDATE_SESSION_SETTINGS, post(handler::update_session_settings))
            .route(routes::CLEANUP_EXPIRED_SESSION, post(handler::cleanup_expired_session))
            .route(routes::GET_ADMIN_DATA, post(handler::get_admin_data))
            .route(routes::TRACK_ANALYTICS, post(handler::track_analytics))
            .route(routes::SESSION, get(handler::session_info))
            .route(routes::ITEMS, get(handler::list_items))
            .route(routes::TEXT, put(handler::upsert_text).delete(handler::clear_text))
            .route(routes::ITEM, delete(handler::remove_item))
            .route(routes::FILES, post(handler::upload_file))
            .route(routes::EVENTS, get(handler::events))
            .route(routes::STATS, get(handler::session_stats))
            .route(routes::ACCESS, post(handler::grant_access).get(handler::has_access))
            .route(routes::FILE_DOWNLOAD, get(handler::download_file))
            .route(routes::HEALTH, get(handler::health))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .with_state(state)
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> ServerResult<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Serves until the process is stopped.
    pub async fn serve(&self, listener: TcpListener) -> ServerResult<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Serves until `shutdown` resolves.
    ///
    /// The expiry sweeper runs for the lifetime of the call.
    pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, admin = self.config.admin_secret.is_some(), "varsclip server listening");

        let sweeper = spawn_sweeper(Arc::clone(&self.service), self.config.sweep_interval);
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;
        sweeper.abort();

        tracing::info!("varsclip server stopped");
        Ok(result?)
    }
}

/// Deletes expired sessions every `interval`.
pub fn spawn_sweeper(service: Arc<SessionService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let service = Arc::clone(&service);
            match tokio::task::spawn_blocking(move || service.sweep_expired()).await {
                Ok(Ok(0)) => {}
                Ok(Ok(removed)) => tracing::info!(removed, "expired sessions swept"),
                Ok(Err(e)) => tracing::warn!(error = %e, "sweep failed"),
                Err(e) => tracing::error!(error = %e, "sweep task panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use varsclip_core::{AccessRequest, Config, Credentials, ManualClock};

    fn core_config() -> Config {
        Config::new().with_password_iterations(1_000)
    }

    #[test]
    fn blob_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = dir.path().join("uploads");
        let config = ServerConfig::default()
            .with_blob_dir(&blobs)
            .with_core(core_config());
        let server = VarsclipServer::new(config).unwrap();
        assert!(blobs.is_dir());
        assert_eq!(server.config().blob_dir.as_deref(), Some(blobs.as_path()));
    }

    #[tokio::test]
    async fn sweeper_removes_expired_sessions() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
        let service = Arc::new(SessionService::with_clock(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryBlobStore::new()),
            clock.clone(),
            core_config(),
        ));
        service
            .access(AccessRequest::new("frdna").with_duration_minutes(Some(5)))
            .unwrap();
        clock.advance(ChronoDuration::minutes(6));

        let sweeper = spawn_sweeper(Arc::clone(&service), Duration::from_millis(10));
        let admin = Credentials::admin();
        assert_eq!(service.admin_overview(&admin).unwrap().sessions.len(), 1);
        for _ in 0..100 {
            if service.admin_overview(&admin).unwrap().sessions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sweeper.abort();

        assert!(service.admin_overview(&admin).unwrap().sessions.is_empty());
    }

    #[tokio::test]
    async fn serves_health_and_shuts_down() {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_core(core_config());
        let server = Arc::new(VarsclipServer::new(config).unwrap());
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let running = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .serve_with_shutdown(listener, async {
                        let _ = stop_rx.await;
                    })
                    .await
            })
        };

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
    }
}
