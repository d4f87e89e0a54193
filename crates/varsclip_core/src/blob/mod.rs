//! Blob storage for uploaded files.
//!
//! Blob stores are opaque byte stores keyed by a relative path of the form
//! `{session_id}/{name}`. They know nothing about sessions or URLs.

mod file;
mod memory;

pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;

use crate::error::{CoreError, CoreResult};

/// A stored blob with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Raw bytes.
    pub data: Vec<u8>,
    /// MIME type recorded at upload.
    pub content_type: String,
}

/// Storage backend for uploaded files.
///
/// # Invariants
///
/// - `get` returns exactly the bytes previously `put` at that path
/// - `delete` of a missing path succeeds and returns false
/// - implementations must be `Send + Sync`
pub trait BlobStore: Send + Sync {
    /// Stores a blob, replacing any previous one at the path.
    fn put(&self, path: &str, blob: Blob) -> CoreResult<()>;

    /// Reads a blob.
    fn get(&self, path: &str) -> CoreResult<Option<Blob>>;

    /// Removes a blob. Returns false if nothing was stored there.
    fn delete(&self, path: &str) -> CoreResult<bool>;
}

/// Rejects paths that could escape the store root.
///
/// Accepted paths are non-empty, relative, and made of segments containing
/// only ASCII alphanumerics, `-`, `_` and `.` (but not `.` or `..` alone).
pub fn check_path(path: &str) -> CoreResult<()> {
    let valid = !path.is_empty()
        && !path.starts_with('/')
        && path.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });
    if valid {
        Ok(())
    } else {
        Err(CoreError::validation("Invalid storage path"))
    }
}
