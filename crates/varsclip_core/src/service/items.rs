//! Shared items, file links and realtime subscriptions.

use super::{parse_code, Credentials, SessionService};
use crate::blob::{check_path, Blob};
use crate::change_feed::{ChangeEvent, Subscription};
use crate::error::{CoreError, CoreResult};
use crate::types::{FileRef, ItemId, ItemKind, Session, SessionId, SessionItem};
use crate::validation::{validate_file, validate_text, FileMeta};
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

/// A file to be shared in a session.
#[derive(Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Original file name.
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl FileUpload {
    /// Creates an upload.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Returns the metadata checked before upload.
    pub fn meta(&self) -> FileMeta<'_> {
        FileMeta {
            name: &self.name,
            size: self.data.len() as u64,
            mime_type: &self.mime_type,
        }
    }
}

impl std::fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUpload")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}

impl SessionService {
    /// Returns the items of a session in display order.
    ///
    /// File links are reissued for the session's current visibility, so a
    /// protected session always hands out fresh signed links.
    pub fn list_items(&self, code: &str, creds: &Credentials) -> CoreResult<Vec<SessionItem>> {
        let session = self.authorized_session(code, creds)?;
        let mut items = self.store.items_for_session(session.id)?;
        for file in items.iter_mut().filter_map(|item| item.file.as_mut()) {
            file.url = self.file_url(&session, &file.storage_path)?;
        }
        Ok(items)
    }

    /// Sets the session's text, creating the text item if there is none.
    ///
    /// Concurrent writers are not reconciled: the last write wins.
    pub fn upsert_text(
        &self,
        code: &str,
        creds: &Credentials,
        content: &str,
    ) -> CoreResult<SessionItem> {
        let mut session = self.authorized_session(code, creds)?;
        validate_text(content, self.config.max_text_bytes)?;

        let items = self.store.items_for_session(session.id)?;
        let position = next_position(&items);
        let existing = items.into_iter().find(|item| item.kind == ItemKind::Text);

        let item = match existing {
            Some(mut item) => {
                item.content = Some(content.to_string());
                if !self.store.update_item(&item)? {
                    return Err(CoreError::not_found("Item not found"));
                }
                self.feed
                    .emit(session.id, ChangeEvent::Updated(item.clone()));
                item
            }
            None => {
                let item = SessionItem::text(session.id, content.to_string(), position, self.now());
                self.store.insert_item(item.clone())?;
                self.feed
                    .emit(session.id, ChangeEvent::Inserted(item.clone()));
                item
            }
        };
        self.touch(&mut session)?;
        Ok(item)
    }

    /// Stores an uploaded file and appends it as an item.
    pub fn add_file(
        &self,
        code: &str,
        creds: &Credentials,
        upload: FileUpload,
    ) -> CoreResult<SessionItem> {
        let mut session = self.authorized_session(code, creds)?;
        validate_file(&upload.meta(), self.config.max_file_bytes)?;

        let now = self.now();
        let storage_path = storage_path(session.id, &upload.name, now);
        let size = upload.data.len() as u64;
        self.blobs.put(
            &storage_path,
            Blob {
                data: upload.data,
                content_type: upload.mime_type.clone(),
            },
        )?;

        let file = FileRef {
            url: self.file_url(&session, &storage_path)?,
            name: upload.name,
            size,
            mime_type: upload.mime_type,
            storage_path: storage_path.clone(),
        };
        let items = self.store.items_for_session(session.id)?;
        let item = SessionItem::upload(session.id, file, next_position(&items), now);
        if let Err(e) = self.store.insert_item(item.clone()) {
            let _ = self.blobs.delete(&storage_path);
            return Err(e);
        }

        tracing::info!(session = %session.code, path = %storage_path, size, "file uploaded");
        self.feed
            .emit(session.id, ChangeEvent::Inserted(item.clone()));
        self.touch(&mut session)?;
        Ok(item)
    }

    /// Removes one item and its stored file.
    pub fn remove_item(&self, code: &str, creds: &Credentials, item_id: ItemId) -> CoreResult<()> {
        let mut session = self.authorized_session(code, creds)?;
        let owned = self
            .store
            .item(item_id)?
            .is_some_and(|item| item.session_id == session.id);
        if !owned {
            return Err(CoreError::not_found("Item not found"));
        }

        if let Some(item) = self.store.delete_item(item_id)? {
            self.discard_file(&item);
            self.feed.emit(
                session.id,
                ChangeEvent::Deleted {
                    item_id,
                    session_id: session.id,
                },
            );
        }
        self.touch(&mut session)?;
        Ok(())
    }

    /// Removes every text item. Returns how many were removed.
    pub fn clear_text(&self, code: &str, creds: &Credentials) -> CoreResult<usize> {
        let mut session = self.authorized_session(code, creds)?;
        let texts: Vec<ItemId> = self
            .store
            .items_for_session(session.id)?
            .into_iter()
            .filter(|item| item.kind == ItemKind::Text)
            .map(|item| item.id)
            .collect();

        let mut removed = 0;
        for item_id in texts {
            if self.store.delete_item(item_id)?.is_some() {
                removed += 1;
                self.feed.emit(
                    session.id,
                    ChangeEvent::Deleted {
                        item_id,
                        session_id: session.id,
                    },
                );
            }
        }
        self.touch(&mut session)?;
        Ok(removed)
    }

    /// Subscribes to the realtime changes of a session.
    pub fn subscribe(&self, code: &str, creds: &Credentials) -> CoreResult<Subscription> {
        let session = self.authorized_session(code, creds)?;
        Ok(self.feed.subscribe(session.id))
    }

    /// Resolves a file link.
    ///
    /// `signature` carries the `expires` and `signature` query parameters
    /// of a signed link. Unsigned access works only for public sessions.
    pub fn fetch_file(&self, path: &str, signature: Option<(i64, &str)>) -> CoreResult<Blob> {
        check_path(path)?;
        let file_not_found = || CoreError::not_found("File not found");

        let session_id = path
            .split('/')
            .next()
            .and_then(|segment| Uuid::parse_str(segment).ok())
            .map(SessionId::from_uuid)
            .ok_or_else(file_not_found)?;
        let session = self
            .store
            .session(session_id)?
            .filter(|s| !s.is_expired(self.now()))
            .ok_or_else(file_not_found)?;

        match signature {
            Some((expires, signature)) => {
                self.signer
                    .verify(path, expires, signature, self.now().timestamp())?;
            }
            None if session.is_public() => {}
            None => return Err(CoreError::unauthorized("Signed link required")),
        }
        self.blobs.get(path)?.ok_or_else(file_not_found)
    }

    /// Builds the link under which a stored file is served.
    pub(crate) fn file_url(&self, session: &Session, storage_path: &str) -> CoreResult<String> {
        let base = &self.config.public_base_url;
        if session.is_public() {
            return Ok(format!("{base}/files/{storage_path}"));
        }
        let expires = (self.now() + self.config.signed_url_ttl).timestamp();
        let signature = self.signer.sign(storage_path, expires)?;
        Ok(format!(
            "{base}/files/{storage_path}?expires={expires}&signature={signature}"
        ))
    }

    pub(crate) fn authorized_session(&self, code: &str, creds: &Credentials) -> CoreResult<Session> {
        let session = self.active_session(&parse_code(code)?)?;
        self.authorize(&session, creds)?;
        Ok(session)
    }

    fn discard_file(&self, item: &SessionItem) {
        if let Some(file) = &item.file {
            if let Err(e) = self.blobs.delete(&file.storage_path) {
                tracing::error!(path = %file.storage_path, error = %e, "deleting file failed");
            }
        }
    }
}

fn next_position(items: &[SessionItem]) -> i64 {
    items.iter().map(|item| item.position).max().map_or(0, |p| p + 1)
}

/// `{session_id}/{millis}-{uuid}.{ext}`, keeping only a short alphanumeric
/// extension from the original name.
fn storage_path(session_id: SessionId, name: &str, now: DateTime<Utc>) -> String {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| "bin".to_string());
    format!(
        "{session_id}/{}-{}.{ext}",
        now.timestamp_millis(),
        Uuid::new_v4()
    )
}
