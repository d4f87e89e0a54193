//! Realtime messages and the server-sent-events framing they travel in.
//!
//! Each change is one SSE frame:
//!
//! ```text
//! event: insert
//! data: {"type":"insert","item":{...}}
//!
//! ```
//!
//! The `event:` line duplicates the payload's `type` so generic SSE
//! clients can filter without parsing JSON.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use varsclip_core::{ChangeEvent, ItemId, SessionId, SessionItem};

/// A change delivered over the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeMessage {
    /// An item was created.
    Insert {
        /// The new item.
        item: SessionItem,
    },
    /// An item was replaced.
    Update {
        /// The item after the change.
        item: SessionItem,
    },
    /// An item was removed.
    Delete {
        /// Removed item.
        #[serde(rename = "itemId")]
        item_id: ItemId,
        /// Owning session.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    /// Connected subscriber count changed.
    Presence {
        /// Subscribers connected now.
        peers: usize,
    },
    /// The session was deleted.
    SessionClosed,
}

impl RealtimeMessage {
    /// Returns the SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            RealtimeMessage::Insert { .. } => "insert",
            RealtimeMessage::Update { .. } => "update",
            RealtimeMessage::Delete { .. } => "delete",
            RealtimeMessage::Presence { .. } => "presence",
            RealtimeMessage::SessionClosed => "session_closed",
        }
    }

    /// Encodes the payload as JSON.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a received frame, checking the event name against the
    /// payload.
    pub fn from_frame(frame: &SseFrame) -> ProtocolResult<Self> {
        let message: RealtimeMessage = serde_json::from_str(&frame.data)?;
        if let Some(event) = &frame.event {
            if event != message.event_name() {
                return Err(ProtocolError::EventMismatch {
                    frame: event.clone(),
                    payload: message.event_name().to_string(),
                });
            }
        }
        Ok(message)
    }

    /// Encodes the message as a complete SSE frame.
    pub fn to_frame(&self) -> ProtocolResult<String> {
        Ok(format!("event: {}\ndata: {}\n\n", self.event_name(), self.to_json()?))
    }
}

impl From<ChangeEvent> for RealtimeMessage {
    fn from(event: ChangeEvent) -> Self {
        match event {
            ChangeEvent::Inserted(item) => RealtimeMessage::Insert { item },
            ChangeEvent::Updated(item) => RealtimeMessage::Update { item },
            ChangeEvent::Deleted {
                item_id,
                session_id,
            } => RealtimeMessage::Delete {
                item_id,
                session_id,
            },
            ChangeEvent::Presence { peers } => RealtimeMessage::Presence { peers },
            ChangeEvent::SessionClosed => RealtimeMessage::SessionClosed,
        }
    }
}

impl From<RealtimeMessage> for ChangeEvent {
    fn from(message: RealtimeMessage) -> Self {
        match message {
            RealtimeMessage::Insert { item } => ChangeEvent::Inserted(item),
            RealtimeMessage::Update { item } => ChangeEvent::Updated(item),
            RealtimeMessage::Delete {
                item_id,
                session_id,
            } => ChangeEvent::Deleted {
                item_id,
                session_id,
            },
            RealtimeMessage::Presence { peers } => ChangeEvent::Presence { peers },
            RealtimeMessage::SessionClosed => ChangeEvent::SessionClosed,
        }
    }
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// Concatenated `data:` lines.
    pub data: String,
}

/// Incremental parser for a `text/event-stream` body.
///
/// Bytes can arrive split anywhere, including inside a UTF-8 sequence.
/// Comment lines (keep-alives) and `id:`/`retry:` fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}
