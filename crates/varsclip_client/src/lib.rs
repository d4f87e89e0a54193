//! # varsclip client
//!
//! Client side of a varsclip session.
//!
//! This crate provides:
//! - [`SessionHook`]: loads a session's items once, applies realtime
//!   changes as they arrive, tracks presence and exposes the mutations
//!   (add text, add file, remove item, clear text)
//! - [`Backend`]: the seam the hook talks through, with an in-process
//!   [`LoopbackBackend`] and an [`HttpBackend`] for a remote server
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use varsclip_client::{Backend, ClientConfig, HttpBackend, SessionHook};
//! use varsclip_core::Credentials;
//! use varsclip_protocol::VerifySessionRequest;
//!
//! let backend = Arc::new(HttpBackend::new(ClientConfig::new("http://127.0.0.1:8080"))?);
//! let access = backend
//!     .verify_session(VerifySessionRequest { session_code: "frdna".into(), ..Default::default() })
//!     .await?;
//! let hook = SessionHook::open(backend, "frdna", Credentials::none().with_token(access.token)).await?;
//! hook.add_text("hello").await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod hook;
mod http;
mod loopback;

pub use backend::{Backend, EventStream};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use hook::{Notice, SessionHook, SessionSnapshot, SESSION_ACCESSED};
pub use http::HttpBackend;
pub use loopback::LoopbackBackend;
