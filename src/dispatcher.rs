use crate::message::{ChatMessage, InboundEvent};
use crate::{chat_debug, chat_warn};
use std::fmt;

/// Single binary payload byte that gets a fixed rendering.
pub const SENTINEL_BYTE: u8 = 0xCB;
pub const SENTINEL_TEXT: &str = "Special server message received!";

/// Close code used when answering a peer-initiated close.
pub const NORMAL_CLOSURE: u16 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of dispatching one inbound event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub message: Option<ChatMessage>,
    /// Close code to echo back to the peer, set for a closing handshake.
    pub acknowledge_close: Option<u16>,
}

impl Dispatch {
    fn message(message: ChatMessage) -> Self {
        Self { message: Some(message), acknowledge_close: None }
    }
}

/// Turns transport events into chat messages and tracks the connection
/// state machine:
///
/// ```text
/// Idle -> Connecting -> Open -> Closing -> Closed
///              \          \        \
///               `----------`--------`--> Failed
/// ```
///
/// `Open -> Closed` is also accepted for peers that drop right after their
/// close frame. Data frames never change state.
#[derive(Debug)]
pub struct Dispatcher {
    state: ConnectionState,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { state: ConnectionState::Idle }
    }

    #[inline] pub fn state(&self) -> ConnectionState { self.state }

    /// `Idle -> Connecting`. Produces no message.
    pub fn begin_connect(&mut self) -> bool {
        if self.state == ConnectionState::Idle {
            self.state = ConnectionState::Connecting;
            true
        } else {
            chat_warn!("begin_connect ignored in state {}", self.state);
            false
        }
    }

    pub fn dispatch(&mut self, event: InboundEvent) -> Dispatch {
        use ConnectionState::*;

        match event {
            InboundEvent::Text(text) => Dispatch::message(ChatMessage::received(text)),
            InboundEvent::Binary(payload) => {
                Dispatch::message(ChatMessage::received(render_binary(&payload)))
            }
            InboundEvent::Open => {
                if !self.transition(&[Connecting], Open, "open") {
                    return Dispatch::default();
                }
                Dispatch::message(ChatMessage::received("Connected to server."))
            }
            InboundEvent::Closing { code, reason } => {
                if !self.transition(&[Open], Closing, "closing") {
                    return Dispatch::default();
                }
                chat_debug!("Peer closing with code {code}: {reason}");
                Dispatch {
                    message: Some(ChatMessage::received(format!(
                        "Server closing connection: {reason}"
                    ))),
                    acknowledge_close: Some(NORMAL_CLOSURE),
                }
            }
            InboundEvent::Closed { reason, .. } => {
                if !self.transition(&[Open, Closing], Closed, "closed") {
                    return Dispatch::default();
                }
                Dispatch::message(ChatMessage::received(format!("Connection closed: {reason}")))
            }
            InboundEvent::Failure(error) => {
                if !self.transition(&[Connecting, Open, Closing], Failed, "failure") {
                    return Dispatch::default();
                }
                Dispatch::message(ChatMessage::received(format!("Connection Error: {error}")))
            }
        }
    }

    fn transition(&mut self, from: &[ConnectionState], to: ConnectionState, event: &str) -> bool {
        if from.contains(&self.state) {
            self.state = to;
            true
        } else {
            chat_warn!("Dropping {event} event in state {}", self.state);
            false
        }
    }
}

/// Display text for a binary frame.
pub fn render_binary(payload: &[u8]) -> String {
    if payload == [SENTINEL_BYTE] {
        SENTINEL_TEXT.to_string()
    } else {
        format!("Received binary data: {}", hex::encode(payload))
    }
}
