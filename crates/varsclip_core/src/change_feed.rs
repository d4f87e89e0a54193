//! Per-session change feed with presence tracking.
//!
//! Every session has its own topic. Subscribing to a topic counts as one
//! connected peer; the current count is broadcast to the topic whenever a
//! subscriber joins or leaves.
//!
//! Events are delivered at most once. A subscriber that falls more than the
//! channel capacity behind skips the events it missed.
//!
//! # Usage
//!
//! ```rust,ignore
//! let feed = ChangeFeed::new();
//! let mut sub = feed.subscribe(session_id);
//!
//! feed.emit(session_id, ChangeEvent::Inserted(item));
//!
//! while let Some(event) = sub.recv().await {
//!     println!("change: {event:?}");
//! }
//! ```

use crate::types::{ItemId, SessionId, SessionItem};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Default number of buffered events per session topic.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A change observed on a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// An item was created.
    Inserted(SessionItem),
    /// An item was replaced in place.
    Updated(SessionItem),
    /// An item was removed.
    Deleted {
        /// Removed item.
        item_id: ItemId,
        /// Session the item belonged to.
        session_id: SessionId,
    },
    /// The number of connected subscribers changed.
    Presence {
        /// Subscribers currently connected to the session.
        peers: usize,
    },
    /// The session was deleted. No further events follow.
    SessionClosed,
}

impl ChangeEvent {
    /// Returns the event name used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Inserted(_) => "insert",
            ChangeEvent::Updated(_) => "update",
            ChangeEvent::Deleted { .. } => "delete",
            ChangeEvent::Presence { .. } => "presence",
            ChangeEvent::SessionClosed => "session_closed",
        }
    }
}

#[derive(Debug)]
struct Topic {
    generation: u64,
    sender: broadcast::Sender<ChangeEvent>,
    peers: usize,
}

#[derive(Debug)]
struct FeedInner {
    topics: RwLock<HashMap<SessionId, Topic>>,
    capacity: usize,
    next_generation: AtomicU64,
}

/// Fan-out of session changes to connected subscribers.
///
/// Cloning a feed yields another handle to the same topics.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl ChangeFeed {
    /// Creates a feed with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a feed buffering up to `capacity` events per session.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                topics: RwLock::new(HashMap::new()),
                capacity: capacity.max(1),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribes to a session and registers one peer.
    ///
    /// The new subscriber receives the presence update its own arrival
    /// triggers.
    pub fn subscribe(&self, session_id: SessionId) -> Subscription {
        let mut topics = self.inner.topics.write();
        let topic = topics.entry(session_id).or_insert_with(|| Topic {
            generation: self.inner.next_generation.fetch_add(1, Ordering::Relaxed),
            sender: broadcast::channel(self.inner.capacity).0,
            peers: 0,
        });
        topic.peers += 1;
        let receiver = topic.sender.subscribe();
        let _ = topic.sender.send(ChangeEvent::Presence { peers: topic.peers });
        tracing::debug!(session = %session_id, peers = topic.peers, "subscriber joined");

        Subscription {
            receiver,
            session_id,
            generation: topic.generation,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Emits an event to every subscriber of a session.
    ///
    /// Returns the number of subscribers that received it.
    pub fn emit(&self, session_id: SessionId, event: ChangeEvent) -> usize {
        let topics = self.inner.topics.read();
        let Some(topic) = topics.get(&session_id) else {
            return 0;
        };
        let kind = event.kind();
        let delivered = topic.sender.send(event).unwrap_or(0);
        tracing::debug!(session = %session_id, event = kind, delivered, "change emitted");
        delivered
    }

    /// Returns the number of peers connected to a session.
    pub fn peer_count(&self, session_id: SessionId) -> usize {
        self.inner
            .topics
            .read()
            .get(&session_id)
            .map_or(0, |topic| topic.peers)
    }

    /// Returns the number of sessions with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.inner.topics.read().len()
    }

    /// Tells every subscriber the session is gone and drops its topic.
    ///
    /// Subscribers receive [`ChangeEvent::SessionClosed`] and then see the
    /// stream end.
    pub fn close_session(&self, session_id: SessionId) {
        if let Some(topic) = self.inner.topics.write().remove(&session_id) {
            let _ = topic.sender.send(ChangeEvent::SessionClosed);
            tracing::debug!(session = %session_id, peers = topic.peers, "topic closed");
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to one session.
///
/// Dropping the subscription releases its presence slot.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    session_id: SessionId,
    generation: u64,
    inner: Arc<FeedInner>,
}

impl Subscription {
    /// Returns the session this subscription observes.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the session has been closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session = %self.session_id,
                        skipped,
                        "subscriber lagging, events dropped"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session = %self.session_id,
                        skipped,
                        "subscriber lagging, events dropped"
                    );
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut topics = self.inner.topics.write();
        let Some(topic) = topics.get_mut(&self.session_id) else {
            return;
        };
        if topic.generation != self.generation {
            return;
        }
        topic.peers = topic.peers.saturating_sub(1);
        tracing::debug!(session = %self.session_id, peers = topic.peers, "subscriber left");
        if topic.peers == 0 {
            topics.remove(&self.session_id);
        } else {
            let _ = topic.sender.send(ChangeEvent::Presence { peers: topic.peers });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn drain(sub: &mut Subscription) -> Vec<ChangeEvent> {
        std::iter::from_fn(|| sub.try_recv()).collect()
    }

    #[test]
    fn presence_counts_subscribers() {
        let feed = ChangeFeed::new();
        let session = SessionId::new();

        let mut first = feed.subscribe(session);
        assert_eq!(drain(&mut first), vec![ChangeEvent::Presence { peers: 1 }]);

        let second = feed.subscribe(session);
        assert_eq!(feed.peer_count(session), 2);
        assert_eq!(drain(&mut first), vec![ChangeEvent::Presence { peers: 2 }]);

        drop(second);
        assert_eq!(feed.peer_count(session), 1);
        assert_eq!(drain(&mut first), vec![ChangeEvent::Presence { peers: 1 }]);

        drop(first);
        assert_eq!(feed.peer_count(session), 0);
        assert_eq!(feed.topic_count(), 0);
    }

    #[test]
    fn events_scoped_to_session() {
        let feed = ChangeFeed::new();
        let a = SessionId::new();
        let b = SessionId::new();
        let mut sub_a = feed.subscribe(a);
        let mut sub_b = feed.subscribe(b);
        drain(&mut sub_a);
        drain(&mut sub_b);

        let item = SessionItem::text(a, "hello".into(), 0, Utc::now());
        assert_eq!(feed.emit(a, ChangeEvent::Inserted(item.clone())), 1);

        assert_eq!(drain(&mut sub_a), vec![ChangeEvent::Inserted(item)]);
        assert!(drain(&mut sub_b).is_empty());
    }

    #[test]
    fn emit_without_subscribers_is_noop() {
        let feed = ChangeFeed::new();
        assert_eq!(feed.emit(SessionId::new(), ChangeEvent::SessionClosed), 0);
    }

    #[tokio::test]
    async fn close_ends_stream() {
        let feed = ChangeFeed::new();
        let session = SessionId::new();
        let mut sub = feed.subscribe(session);
        drain(&mut sub);

        feed.close_session(session);
        assert_eq!(sub.recv().await, Some(ChangeEvent::SessionClosed));
        assert_eq!(sub.recv().await, None);

        // A late drop must not disturb a fresh topic for the same id.
        let mut fresh = feed.subscribe(session);
        drop(sub);
        assert_eq!(feed.peer_count(session), 1);
        assert_eq!(drain(&mut fresh), vec![ChangeEvent::Presence { peers: 1 }]);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let feed = ChangeFeed::with_capacity(2);
        let session = SessionId::new();
        let mut sub = feed.subscribe(session);

        for peers in 10..15 {
            feed.emit(session, ChangeEvent::Presence { peers });
        }
        assert_eq!(sub.recv().await, Some(ChangeEvent::Presence { peers: 13 }));
        assert_eq!(sub.recv().await, Some(ChangeEvent::Presence { peers: 14 }));
    }
}
