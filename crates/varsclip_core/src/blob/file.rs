//! Filesystem blob store for persistent uploads.

use super::{check_path, Blob, BlobStore};
use crate::error::CoreResult;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const CONTENT_TYPE_SUFFIX: &str = ".content-type";

/// A blob store that writes each upload to a file under a root directory.
///
/// Layout:
///
/// ```text
/// root/
/// ├── {session_id}/
/// │   ├── {name}                 # raw bytes
/// │   └── {name}.content-type    # MIME type
/// ```
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never observes a partial blob.
#[derive(Debug)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> CoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn type_path(&self, path: &str) -> PathBuf {
        self.root.join(format!("{path}{CONTENT_TYPE_SUFFIX}"))
    }
}

fn write_atomic(target: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = target.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, target)
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

impl BlobStore for FileBlobStore {
    fn put(&self, path: &str, blob: Blob) -> CoreResult<()> {
        check_path(path)?;
        let data_path = self.data_path(path);
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&data_path, &blob.data)?;
        write_atomic(&self.type_path(path), blob.content_type.as_bytes())?;
        Ok(())
    }

    fn get(&self, path: &str) -> CoreResult<Option<Blob>> {
        check_path(path)?;
        let data = match fs::read(self.data_path(path)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = fs::read_to_string(self.type_path(path))
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(Some(Blob { data, content_type }))
    }

    fn delete(&self, path: &str) -> CoreResult<bool> {
        check_path(path)?;
        let existed = remove_if_present(&self.data_path(path))?;
        remove_if_present(&self.type_path(path))?;

        // Drop the per-session directory once it is empty.
        if let Some(parent) = self.data_path(path).parent() {
            if parent != self.root {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(existed)
    }
}
