//! # varsclip server
//!
//! HTTP front end for varsclip shared clipboard sessions.
//!
//! This crate provides:
//! - The six lifecycle functions (verify, extend, settings, cleanup,
//!   admin data, analytics) as JSON `POST` endpoints
//! - Item endpoints for listing, text upsert, file upload and deletion
//! - A server-sent event stream of item changes and presence per session
//! - Signed file downloads
//! - A background sweeper that deletes expired sessions
//!
//! # Authentication
//!
//! Protected sessions accept either a bearer token issued by
//! `verify-session-password` or the session password in the
//! `x-session-password` header. Admin endpoints require the
//! `x-admin-secret` header and are disabled when no secret is configured.
//!
//! ```rust,ignore
//! use varsclip_server::{ServerConfig, VarsclipServer};
//!
//! let config = ServerConfig::from_env()?.with_admin_secret("s3cret");
//! let server = VarsclipServer::new(config)?;
//! server.serve(server.bind().await?).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;

pub use auth::{bearer_token, client_info, header_credentials, AdminGate};
pub use config::{ServerConfig, ENV_PREFIX};
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::{spawn_sweeper, VarsclipServer};
