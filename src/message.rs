use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// One entry of the chat log. Never changes once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    text: String,
    direction: Direction,
}

impl ChatMessage {
    pub fn sent(text: impl Into<String>) -> Self {
        Self { text: text.into(), direction: Direction::Sent }
    }

    pub fn received(text: impl Into<String>) -> Self {
        Self { text: text.into(), direction: Direction::Received }
    }

    #[inline] pub fn text(&self) -> &str            { &self.text }
    #[inline] pub fn direction(&self) -> Direction  { self.direction }
}

/// Everything the transport reports about one connection, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Open,

    Text(String),

    Binary(Bytes),

    /// Peer sent a close frame.
    Closing {
        code: u16,
        reason: String,
    },

    /// Close handshake finished and the stream ended.
    Closed {
        code: u16,
        reason: String,
    },

    Failure(String),
}

struct HistoryInner {
    messages: Mutex<Vec<ChatMessage>>,
    feed: Option<UnboundedSender<ChatMessage>>,
}

/// Append-only, ordered chat log shared between the send path and the
/// dispatch loop.
///
/// Every append happens under one lock, and the optional feed receives the
/// same messages in the same order, so a renderer never sees a different
/// order than [`MessageHistory::snapshot`].
#[derive(Clone)]
pub struct MessageHistory {
    inner: Arc<HistoryInner>,
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHistory {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HistoryInner { messages: Mutex::new(Vec::new()), feed: None }),
        }
    }

    /// History plus a receiver that mirrors every append.
    pub fn with_feed() -> (Self, UnboundedReceiver<ChatMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let history = Self {
            inner: Arc::new(HistoryInner { messages: Mutex::new(Vec::new()), feed: Some(tx) }),
        };
        (history, rx)
    }

    pub fn push(&self, message: ChatMessage) {
        let mut messages = self.lock();
        self.append_locked(&mut messages, message);
    }

    /// Runs `f` while holding the append lock and records its message on
    /// success. Nothing is recorded when `f` fails.
    pub fn push_with<E>(&self, f: impl FnOnce() -> Result<ChatMessage, E>) -> Result<(), E> {
        let mut messages = self.lock();
        let message = f()?;
        self.append_locked(&mut messages, message);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<ChatMessage> {
        self.lock().last().cloned()
    }

    fn append_locked(&self, messages: &mut Vec<ChatMessage>, message: ChatMessage) {
        if let Some(feed) = &self.inner.feed {
            // a dropped renderer must not stop the log
            let _ = feed.send(message.clone());
        }
        messages.push(message);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.inner.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
