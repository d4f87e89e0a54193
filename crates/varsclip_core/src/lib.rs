//! # varsclip core
//!
//! Session model and lifecycle for varsclip, a realtime collaborative
//! clipboard.
//!
//! This crate provides:
//! - Validation rules for session codes, passwords, text and files
//! - PBKDF2 password hashing, bearer tokens and signed file links
//! - Storage traits for session records and uploaded blobs, with
//!   in-memory and filesystem implementations
//! - A per-session change feed with presence counting
//! - [`SessionService`], which authorizes and performs every operation
//!
//! ## Example
//!
//! ```rust,ignore
//! use varsclip_core::{AccessRequest, Config, Credentials, SessionService};
//!
//! let service = SessionService::in_memory(Config::default());
//! service.access(AccessRequest::new("frdna"))?;
//! service.upsert_text("frdna", &Credentials::none(), "hello")?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod blob;
mod change_feed;
mod clock;
mod config;
pub mod crypto;
mod error;
mod service;
pub mod store;
mod types;
pub mod validation;

pub use blob::{Blob, BlobStore, FileBlobStore, InMemoryBlobStore};
pub use change_feed::{ChangeEvent, ChangeFeed, Subscription, DEFAULT_CHANNEL_CAPACITY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    Config, DEFAULT_PASSWORD_ITERATIONS, MAX_EXTENSION_MINUTES, MAX_FILE_BYTES, MAX_TEXT_BYTES,
};
pub use crypto::{PasswordHasher, UrlSigner};
pub use error::{CoreError, CoreResult};
pub use service::{
    AccessGranted, AccessMode, AccessRequest, AdminOverview, CleanupReport, Credentials,
    FileUpload, IssuedToken, SessionInfo, SessionService, SessionStats, SessionSummary,
    SettingsChange,
};
pub use store::{InMemoryStore, SessionStore};
pub use types::{
    AccessGrant, AnalyticsEvent, ClientInfo, FileRef, ItemId, ItemKind, Protection, Session,
    SessionCode, SessionId, SessionItem, TokenRecord,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
