//! The session hook: live item state for one open session.
//!
//! Opening a hook subscribes to the session's realtime stream, loads the
//! item list once and then applies every change as it arrives. Writes made
//! through the hook show up locally via that stream like anyone else's,
//! so a slow response never overwrites a newer event. The current state is
//! published on a [`watch`] channel and user-facing notices on an
//! unbounded channel.
//!
//! Reconnection is not attempted. When the stream ends the snapshot
//! reports `connected == false` and the caller decides what to do.

use crate::backend::{Backend, EventStream};
use crate::error::{ClientError, ClientResult};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use varsclip_core::validation::validate_file;
use varsclip_core::{Credentials, FileUpload, ItemId, ItemKind, SessionItem, MAX_FILE_BYTES};
use varsclip_protocol::RealtimeMessage;

/// Analytics action recorded when a hook opens.
pub const SESSION_ACCESSED: &str = "session_accessed";

/// Local view of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Items in display order.
    pub items: Vec<SessionItem>,
    /// Connected subscribers, including this one.
    pub peers: usize,
    /// The realtime stream is open.
    pub connected: bool,
    /// The session was deleted.
    pub closed: bool,
}

impl SessionSnapshot {
    /// Returns the text item, if any.
    pub fn text(&self) -> Option<&SessionItem> {
        self.items.iter().find(|item| item.kind == ItemKind::Text)
    }

    fn upsert(&mut self, item: SessionItem) {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
        self.items
            .sort_by(|a, b| (a.position, a.created_at).cmp(&(b.position, b.created_at)));
    }

    fn remove(&mut self, item_id: ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != item_id);
        self.items.len() != before
    }

    fn apply(&mut self, message: RealtimeMessage) {
        match message {
            RealtimeMessage::Insert { item } | RealtimeMessage::Update { item } => self.upsert(item),
            RealtimeMessage::Delete { item_id, .. } => {
                self.remove(item_id);
            }
            RealtimeMessage::Presence { peers } => self.peers = peers,
            RealtimeMessage::SessionClosed => {
                self.closed = true;
                self.connected = false;
            }
        }
    }
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Something worth telling the user.
    Info(String),
    /// Something went wrong.
    Error(String),
}

/// Live state and mutations for one session.
pub struct SessionHook {
    backend: Arc<dyn Backend>,
    code: String,
    creds: Credentials,
    state: Arc<watch::Sender<SessionSnapshot>>,
    notices: mpsc::UnboundedSender<Notice>,
    notice_rx: Option<mpsc::UnboundedReceiver<Notice>>,
    listener: JoinHandle<()>,
}

impl SessionHook {
    /// Opens a session.
    ///
    /// `creds` must already authorize the session: a token from
    /// [`Backend::verify_session`] for protected sessions, nothing for
    /// public ones.
    pub async fn open(
        backend: Arc<dyn Backend>,
        code: impl Into<String>,
        creds: Credentials,
    ) -> ClientResult<Self> {
        let code = code.into();
        let events = backend.subscribe(&code, &creds).await?;
        let items = backend.list_items(&code, &creds).await?;

        let mut initial = SessionSnapshot {
            connected: true,
            ..SessionSnapshot::default()
        };
        for item in items {
            initial.upsert(item);
        }
        let (state, _) = watch::channel(initial);
        let state = Arc::new(state);
        let (notices, notice_rx) = mpsc::unbounded_channel();

        let listener = tokio::spawn(listen(
            events,
            Arc::clone(&state),
            notices.clone(),
            code.clone(),
        ));
        tracing::info!(session = %code, "session opened");

        let tracker = Arc::clone(&backend);
        let tracked = code.clone();
        tokio::spawn(async move {
            if let Err(e) = tracker.track(&tracked, SESSION_ACCESSED, None).await {
                tracing::debug!(session = %tracked, error = %e, "analytics not recorded");
            }
        });

        Ok(Self {
            backend,
            code,
            creds,
            state,
            notices,
            notice_rx: Some(notice_rx),
            listener,
        })
    }

    /// Returns the session code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Watches state changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Takes the notice receiver. Returns `None` after the first call.
    pub fn notices(&mut self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.notice_rx.take()
    }

    /// Sets the session text. Whitespace-only content is ignored.
    pub async fn add_text(&self, content: &str) -> ClientResult<Option<SessionItem>> {
        if content.trim().is_empty() {
            return Ok(None);
        }
        let item = self
            .report(self.backend.upsert_text(&self.code, &self.creds, content).await)?;
        Ok(Some(item))
    }

    /// Uploads a file after checking it locally.
    pub async fn add_file(&self, upload: FileUpload) -> ClientResult<SessionItem> {
        let checked = validate_file(&upload.meta(), MAX_FILE_BYTES)
            .map_err(|e| ClientError::Invalid(e.to_string()));
        self.report(checked)?;

        let name = upload.name.clone();
        let item = self.report(self.backend.add_file(&self.code, &self.creds, upload).await)?;
        self.notify(Notice::Info(format!("Uploaded {name}")));
        Ok(item)
    }

    /// Removes an item.
    ///
    /// The item disappears locally at once. If the server refuses, the
    /// list is reloaded.
    pub async fn remove_item(&self, item_id: ItemId) -> ClientResult<()> {
        self.state.send_if_modified(|s| s.remove(item_id));
        let result = self
            .backend
            .remove_item(&self.code, &self.creds, item_id)
            .await;
        if let Err(e) = result {
            self.notify(Notice::Error(e.to_string()));
            if let Err(reload) = self.reload().await {
                tracing::warn!(session = %self.code, error = %reload, "reload after failed delete failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Deletes every text item. Returns how many were removed.
    pub async fn clear_text(&self) -> ClientResult<usize> {
        let removed = self.report(self.backend.clear_text(&self.code, &self.creds).await)?;
        self.state
            .send_modify(|s| s.items.retain(|item| item.kind != ItemKind::Text));
        Ok(removed)
    }

    /// Replaces local items with the server's list.
    pub async fn reload(&self) -> ClientResult<()> {
        let items = self.report(self.backend.list_items(&self.code, &self.creds).await)?;
        self.state.send_modify(|s| {
            s.items.clear();
            for item in items {
                s.upsert(item);
            }
        });
        Ok(())
    }

    /// Stops listening. Dropping the hook does the same.
    pub fn close(self) {}

    fn report<T>(&self, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(e) = &result {
            self.notify(Notice::Error(e.to_string()));
        }
        result
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}

impl Drop for SessionHook {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl std::fmt::Debug for SessionHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHook")
            .field("code", &self.code)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

async fn listen(
    mut events: EventStream,
    state: Arc<watch::Sender<SessionSnapshot>>,
    notices: mpsc::UnboundedSender<Notice>,
    code: String,
) {
    while let Some(event) = events.next().await {
        match event {
            Ok(RealtimeMessage::SessionClosed) => {
                state.send_modify(|s| s.apply(RealtimeMessage::SessionClosed));
                let _ = notices.send(Notice::Info("This session has been deleted".into()));
                tracing::info!(session = %code, "session closed remotely");
                return;
            }
            Ok(message) => state.send_modify(|s| s.apply(message)),
            Err(ClientError::Protocol(e)) => {
                tracing::warn!(session = %code, error = %e, "skipping undecodable event");
            }
            Err(e) => {
                tracing::warn!(session = %code, error = %e, "event stream failed");
                let _ = notices.send(Notice::Error(format!("Connection lost: {e}")));
                break;
            }
        }
    }
    state.send_modify(|s| s.connected = false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::stream;
    use std::sync::Mutex;
    use std::time::Duration;
    use varsclip_core::{SessionId, SessionInfo};
    use varsclip_protocol::{
        CleanupSessionRequest, CleanupSessionResponse, ExtendSessionRequest,
        ExtendSessionResponse, ProtocolError, UpdateSettingsRequest, UpdateSettingsResponse,
        VerifySessionRequest, VerifySessionResponse,
    };

    type Feed = mpsc::UnboundedSender<ClientResult<RealtimeMessage>>;

    /// Backend whose stream is fed by the test. Its text write reports
    /// `stale` only after `fresh` has already gone out on the stream.
    struct ScriptedBackend {
        feed: Feed,
        events: Mutex<Option<mpsc::UnboundedReceiver<ClientResult<RealtimeMessage>>>>,
        stale: SessionItem,
        fresh: SessionItem,
    }

    impl ScriptedBackend {
        fn new(stale: SessionItem, fresh: SessionItem) -> (Arc<Self>, Feed) {
            let (feed, events) = mpsc::unbounded_channel();
            let backend = Arc::new(Self {
                feed: feed.clone(),
                events: Mutex::new(Some(events)),
                stale,
                fresh,
            });
            (backend, feed)
        }
    }

    fn unsupported<T>() -> ClientResult<T> {
        Err(ClientError::Invalid("unsupported".into()))
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn verify_session(
            &self,
            _: VerifySessionRequest,
        ) -> ClientResult<VerifySessionResponse> {
            unsupported()
        }

        async fn extend_session(
            &self,
            _: ExtendSessionRequest,
        ) -> ClientResult<ExtendSessionResponse> {
            unsupported()
        }

        async fn update_settings(
            &self,
            _: UpdateSettingsRequest,
        ) -> ClientResult<UpdateSettingsResponse> {
            unsupported()
        }

        async fn cleanup_session(
            &self,
            _: CleanupSessionRequest,
        ) -> ClientResult<CleanupSessionResponse> {
            unsupported()
        }

        async fn session_info(&self, _: &str) -> ClientResult<SessionInfo> {
            unsupported()
        }

        async fn track(&self, _: &str, _: &str, _: Option<serde_json::Value>) -> ClientResult<()> {
            Ok(())
        }

        async fn list_items(&self, _: &str, _: &Credentials) -> ClientResult<Vec<SessionItem>> {
            Ok(Vec::new())
        }

        async fn upsert_text(
            &self,
            _: &str,
            _: &Credentials,
            _: &str,
        ) -> ClientResult<SessionItem> {
            let _ = self.feed.send(Ok(RealtimeMessage::Update {
                item: self.fresh.clone(),
            }));
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(self.stale.clone())
        }

        async fn add_file(
            &self,
            _: &str,
            _: &Credentials,
            _: FileUpload,
        ) -> ClientResult<SessionItem> {
            unsupported()
        }

        async fn remove_item(&self, _: &str, _: &Credentials, _: ItemId) -> ClientResult<()> {
            unsupported()
        }

        async fn clear_text(&self, _: &str, _: &Credentials) -> ClientResult<usize> {
            unsupported()
        }

        async fn subscribe(&self, _: &str, _: &Credentials) -> ClientResult<EventStream> {
            let events = self
                .events
                .lock()
                .unwrap()
                .take()
                .ok_or(ClientError::Closed)?;
            let stream = stream::unfold(events, |mut events| async move {
                let event = events.recv().await?;
                Some((event, events))
            });
            Ok(stream.boxed())
        }
    }

    async fn wait_for(
        hook: &SessionHook,
        check: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = hook.watch();
        let seen = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(check))
            .await
            .expect("state change in time")
            .expect("hook alive");
        seen.clone()
    }

    #[tokio::test]
    async fn write_response_does_not_overwrite_newer_event() {
        let mut stale = text(0);
        stale.content = Some("a".into());
        let mut fresh = stale.clone();
        fresh.content = Some("b".into());
        let (backend, _feed) = ScriptedBackend::new(stale, fresh);

        let hook = SessionHook::open(backend, "frdna", Credentials::none())
            .await
            .unwrap();
        let returned = hook.add_text("a").await.unwrap().unwrap();
        assert_eq!(returned.content.as_deref(), Some("a"));

        let seen = wait_for(&hook, |s| s.text().is_some()).await;
        assert_eq!(seen.text().unwrap().content.as_deref(), Some("b"));
        assert_eq!(hook.snapshot().text().unwrap().content.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn undecodable_event_is_skipped() {
        let (backend, feed) = ScriptedBackend::new(text(0), text(0));
        let mut hook = SessionHook::open(backend, "frdna", Credentials::none())
            .await
            .unwrap();
        let mut notices = hook.notices().unwrap();

        feed.send(Err(ProtocolError::UnknownEvent("ping".into()).into()))
            .unwrap();
        feed.send(Ok(RealtimeMessage::Presence { peers: 2 })).unwrap();

        let seen = wait_for(&hook, |s| s.peers == 2).await;
        assert!(seen.connected);
        assert!(notices.try_recv().is_err());

        feed.send(Err(ClientError::Transport("reset".into()))).unwrap();
        let seen = wait_for(&hook, |s| !s.connected).await;
        assert!(!seen.closed);
        assert!(matches!(notices.recv().await, Some(Notice::Error(_))));
    }

    fn text(position: i64) -> SessionItem {
        SessionItem::text(SessionId::new(), format!("t{position}"), position, Utc::now())
    }

    #[test]
    fn insert_of_known_id_replaces() {
        let mut snapshot = SessionSnapshot::default();
        let mut item = text(0);
        snapshot.apply(RealtimeMessage::Insert { item: item.clone() });
        item.content = Some("changed".into());
        snapshot.apply(RealtimeMessage::Insert { item: item.clone() });

        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.text().unwrap().content.as_deref(), Some("changed"));
    }

    #[test]
    fn items_stay_ordered_by_position() {
        let mut snapshot = SessionSnapshot::default();
        snapshot.apply(RealtimeMessage::Insert { item: text(2) });
        snapshot.apply(RealtimeMessage::Insert { item: text(0) });
        snapshot.apply(RealtimeMessage::Insert { item: text(1) });

        let positions: Vec<i64> = snapshot.items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn delete_of_unknown_id_is_noop() {
        let mut snapshot = SessionSnapshot::default();
        snapshot.apply(RealtimeMessage::Insert { item: text(0) });
        snapshot.apply(RealtimeMessage::Delete {
            item_id: ItemId::new(),
            session_id: SessionId::new(),
        });
        assert_eq!(snapshot.items.len(), 1);
    }

    #[test]
    fn presence_and_close() {
        let mut snapshot = SessionSnapshot {
            connected: true,
            ..SessionSnapshot::default()
        };
        snapshot.apply(RealtimeMessage::Presence { peers: 3 });
        assert_eq!(snapshot.peers, 3);

        snapshot.apply(RealtimeMessage::SessionClosed);
        assert!(snapshot.closed);
        assert!(!snapshot.connected);
    }
}
