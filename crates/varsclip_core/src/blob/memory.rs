//! In-memory blob store for testing.

use super::{check_path, Blob, BlobStore};
use crate::error::CoreResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A blob store that keeps uploads in memory.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Blob>>,
}

impl InMemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, path: &str, blob: Blob) -> CoreResult<()> {
        check_path(path)?;
        self.blobs.write().insert(path.to_string(), blob);
        Ok(())
    }

    fn get(&self, path: &str) -> CoreResult<Option<Blob>> {
        check_path(path)?;
        Ok(self.blobs.read().get(path).cloned())
    }

    fn delete(&self, path: &str) -> CoreResult<bool> {
        check_path(path)?;
        Ok(self.blobs.write().remove(path).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(data: &[u8]) -> Blob {
        Blob {
            data: data.to_vec(),
            content_type: "text/plain".into(),
        }
    }

    #[test]
    fn put_get_delete() {
        let store = InMemoryBlobStore::new();
        assert!(store.is_empty());

        store.put("s/a.txt", blob(b"hello")).unwrap();
        assert_eq!(store.get("s/a.txt").unwrap(), Some(blob(b"hello")));
        assert_eq!(store.len(), 1);

        assert!(store.delete("s/a.txt").unwrap());
        assert!(!store.delete("s/a.txt").unwrap());
        assert!(store.get("s/a.txt").unwrap().is_none());
    }

    #[test]
    fn rejects_traversal() {
        let store = InMemoryBlobStore::new();
        assert!(store.put("../x", blob(b"no")).is_err());
    }
}
