use crate::classifier::{classify, OutboundFrame};
use crate::client::{ChatClient, ClientError, Transport};
use crate::config::ChatClientConfig;
use crate::dispatcher::{ConnectionState, Dispatcher};
use crate::message::{ChatMessage, InboundEvent, MessageHistory};
use crate::{chat_debug, chat_info, chat_warn};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The frame was not queued. `input` is handed back for a retry.
    #[error("message not sent ({source}): {input}")]
    NotQueued {
        input: String,
        #[source]
        source: ClientError,
    },
}

impl SubmitError {
    pub fn input(&self) -> &str {
        match self {
            SubmitError::NotQueued { input, .. } => input,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was blank after trimming; nothing happened.
    Empty,
    Sent(OutboundFrame),
}

/// One connection plus its chat log.
///
/// Inbound events are dispatched on a background task; sends go through
/// [`ChatSession::submit`]. Both append to the same [`MessageHistory`].
pub struct ChatSession<T: Transport + 'static> {
    id: Uuid,
    transport: Arc<T>,
    history: MessageHistory,
    state_rx: watch::Receiver<ConnectionState>,
    dispatch_jh: JoinHandle<()>,
}

impl ChatSession<ChatClient> {
    /// Opens a WebSocket session.
    ///
    /// A failed handshake is recorded in `history` as a connection error
    /// before the error is returned.
    pub async fn connect(
        cfg: &ChatClientConfig,
        history: MessageHistory,
    ) -> Result<Self, ClientError> {
        let mut dispatcher = Dispatcher::new();
        dispatcher.begin_connect();
        chat_info!("Connecting to {}", cfg.url());

        match ChatClient::connect(cfg).await {
            Ok((client, events)) => {
                let id = client.id();
                Ok(Self::spawn(id, Arc::new(client), events, history, dispatcher))
            }
            Err(e) => {
                chat_warn!("Connect to {} failed: {}", cfg.url(), e);
                if let Some(message) = dispatcher.dispatch(InboundEvent::Failure(e.to_string())).message {
                    history.push(message);
                }
                Err(e)
            }
        }
    }
}

impl<T: Transport + 'static> ChatSession<T> {
    /// Runs a session over an already connected transport. `events` must
    /// start with `InboundEvent::Open`.
    pub fn start(transport: Arc<T>, events: Receiver<InboundEvent>, history: MessageHistory) -> Self {
        let mut dispatcher = Dispatcher::new();
        dispatcher.begin_connect();
        Self::spawn(Uuid::new_v4(), transport, events, history, dispatcher)
    }

    fn spawn(
        id: Uuid,
        transport: Arc<T>,
        events: Receiver<InboundEvent>,
        history: MessageHistory,
        dispatcher: Dispatcher,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(dispatcher.state());
        let dispatch_jh = tokio::spawn(Self::dispatch_loop(
            id,
            Arc::clone(&transport),
            events,
            history.clone(),
            dispatcher,
            state_tx,
        ));

        Self { id, transport, history, state_rx, dispatch_jh }
    }

    async fn dispatch_loop(
        id: Uuid,
        transport: Arc<T>,
        mut events: Receiver<InboundEvent>,
        history: MessageHistory,
        mut dispatcher: Dispatcher,
        state_tx: watch::Sender<ConnectionState>,
    ) {
        while let Some(event) = events.recv().await {
            let dispatch = dispatcher.dispatch(event);
            state_tx.send_replace(dispatcher.state());

            if let Some(message) = dispatch.message {
                history.push(message);
            }
            if let Some(code) = dispatch.acknowledge_close {
                if let Err(e) = transport.close(code, "") {
                    chat_debug!("Close acknowledgement for session {} not queued: {}", id, e);
                }
            }

            if dispatcher.state().is_terminal() {
                break;
            }
        }
        chat_info!("Session {} finished in state {}", id, dispatcher.state());
    }

    /// Trims `raw`, classifies it and queues it on the transport.
    ///
    /// On success the original (trimmed) text is appended as a sent
    /// message, also when it went out as a single byte. On failure nothing
    /// is appended and the input comes back inside the error.
    pub fn submit(&self, raw: &str) -> Result<SubmitOutcome, SubmitError> {
        let input = raw.trim();
        if input.is_empty() {
            return Ok(SubmitOutcome::Empty);
        }

        let frame = classify(input);
        self.history
            .push_with(|| {
                let queued = match &frame {
                    OutboundFrame::Text(text) => self.transport.send_text(text),
                    OutboundFrame::Byte(value) => {
                        self.transport.send_binary(Bytes::copy_from_slice(&[*value]))
                    }
                };
                queued.map(|()| ChatMessage::sent(input))
            })
            .map_err(|source| {
                chat_warn!("Send on session {} failed: {}", self.id, source);
                SubmitError::NotQueued { input: input.to_string(), source }
            })?;

        Ok(SubmitOutcome::Sent(frame))
    }

    /// Starts the close handshake. The history records the peer's answer.
    pub fn close(&self, code: u16, reason: &str) -> Result<(), ClientError> {
        self.transport.close(code, reason)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Resolves once the session reached `Closed` or `Failed`.
    pub async fn wait_terminal(&self) -> ConnectionState {
        let mut rx = self.state_rx.clone();
        let reached = rx.wait_for(|state| state.is_terminal()).await.map(|state| *state);
        // dispatch loop gone: report whatever it left behind
        reached.unwrap_or_else(|_| *rx.borrow())
    }

    #[inline] pub fn id(&self) -> Uuid                   { self.id }
    #[inline] pub fn history(&self) -> &MessageHistory   { &self.history }
    #[inline] pub fn transport(&self) -> &T              { &self.transport }
}

impl<T: Transport + 'static> Drop for ChatSession<T> {
    fn drop(&mut self) {
        self.dispatch_jh.abort();
    }
}
