use crate::client::error::ClientError;
use crate::message::InboundEvent;
use crate::{chat_debug, chat_error, chat_warn};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the peer sent a close frame without one.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Frames queued for the write task.
#[derive(Debug)]
pub(crate) enum Outgoing {
    Text(String),
    Binary(Bytes),
    Close { code: u16, reason: String },
}

/// Flags shared by the handle and both loops.
#[derive(Default)]
struct CloseFlags {
    /// No more frames are accepted from the application.
    closing: AtomicBool,
    /// The peer's close frame was read; tungstenite has answered it already.
    peer_closed: AtomicBool,
}

pub(crate) struct IoCore {
    pub id:  Uuid,
    pub url: String,
    write_tx: Sender<Outgoing>,
    flags:    Arc<CloseFlags>,
    read_jh:  JoinHandle<()>,
    write_jh: JoinHandle<()>,
}

impl IoCore {
    pub fn new(
        ws: WsStream,
        url: String,
        to_app: Sender<InboundEvent>,
        queue_capacity: usize,
        write_timeout: Duration,
    ) -> Self {
        let (sink, stream) = ws.split();
        let (write_tx, write_rx) = mpsc::channel::<Outgoing>(queue_capacity);
        let id = Uuid::new_v4();
        let flags = Arc::new(CloseFlags::default());
        // the reader is the only one that reports the end of the connection
        let (failed_tx, failed_rx) = oneshot::channel::<ClientError>();

        // ---------------- Write-Loop -----------------------------------
        let write_jh = {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move {
                if let Err(e) = Self::write_task(sink, write_rx, &flags, write_timeout, id).await {
                    chat_warn!("Write task error for session {}: {}", id, e);
                    let _ = failed_tx.send(e);
                }
            })
        };

        // ---------------- Reader-Loop -----------------------------------
        let read_jh = {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move {
                Self::read_task(stream, to_app, failed_rx, &flags, id).await;
            })
        };

        Self { id, url, write_tx, flags, read_jh, write_jh }
    }

    /* ----------------------------------------------------------------
       Public Helpers
    ---------------------------------------------------------------- */

    /// Queues a data frame without waiting. `Ok` means queued, not delivered.
    pub fn try_send(&self, frame: Outgoing) -> Result<(), ClientError> {
        if self.flags.closing.load(Ordering::Acquire) {
            return Err(ClientError::Closing);
        }
        self.enqueue(frame)
    }

    /// Queues a close frame. Only the first call is accepted.
    pub fn close(&self, code: u16, reason: &str) -> Result<(), ClientError> {
        if self.flags.closing.swap(true, Ordering::AcqRel) {
            return Err(ClientError::Closing);
        }
        let result = self.enqueue(Outgoing::Close { code, reason: reason.to_string() });
        if result.is_err() {
            self.flags.closing.store(false, Ordering::Release);
        }
        result
    }

    pub fn is_closing(&self) -> bool {
        self.flags.closing.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        !self.write_jh.is_finished() && !self.read_jh.is_finished()
    }

    fn enqueue(&self, frame: Outgoing) -> Result<(), ClientError> {
        self.write_tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ClientError::QueueFull,
            TrySendError::Closed(_) => ClientError::ChannelClosed,
        })
    }

    /* ----------------------------------------------------------------
       PRIVATE Loops
    ---------------------------------------------------------------- */
    async fn read_task(
        mut stream: SplitStream<WsStream>,
        to_app: Sender<InboundEvent>,
        mut write_failed: oneshot::Receiver<ClientError>,
        flags: &CloseFlags,
        session_id: Uuid,
    ) {
        chat_debug!("Read task started for session {}", session_id);

        if to_app.send(InboundEvent::Open).await.is_err() {
            return;
        }

        // Set once the peer's close frame has been seen; decides how the
        // end of the stream is reported.
        let mut peer_close: Option<(u16, String)> = None;
        let mut writer_running = true;

        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                failed = &mut write_failed, if writer_running => {
                    match failed {
                        Ok(e) => {
                            chat_error!("Writer for session {} failed: {}", session_id, e);
                            let _ = to_app.send(InboundEvent::Failure(e.to_string())).await;
                            return;
                        }
                        // writer finished without error
                        Err(_) => {
                            writer_running = false;
                            continue;
                        }
                    }
                }
            };

            let event = match next {
                Some(Ok(Message::Text(text))) => {
                    chat_debug!("Session {} received text ({} bytes)", session_id, text.len());
                    InboundEvent::Text(text)
                }
                Some(Ok(Message::Binary(data))) => {
                    chat_debug!("Session {} received binary: {}", session_id, hex::encode(&data));
                    InboundEvent::Binary(Bytes::from(data))
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|cf| (u16::from(cf.code), cf.reason.into_owned()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                    flags.closing.store(true, Ordering::Release);
                    flags.peer_closed.store(true, Ordering::Release);
                    peer_close = Some((code, reason.clone()));
                    InboundEvent::Closing { code, reason }
                }
                // answered by tungstenite itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
                | None => {
                    let last = match peer_close.take() {
                        Some((code, reason)) => InboundEvent::Closed { code, reason },
                        None => {
                            InboundEvent::Failure("connection closed without a close frame".into())
                        }
                    };
                    chat_debug!("Stream ended for session {}", session_id);
                    let _ = to_app.send(last).await;
                    return;
                }
                Some(Err(e)) => {
                    let last = match peer_close.take() {
                        Some((code, reason)) => {
                            chat_debug!("Session {} ended after close frame: {}", session_id, e);
                            InboundEvent::Closed { code, reason }
                        }
                        None => {
                            chat_error!("Read error for session {}: {}", session_id, e);
                            InboundEvent::Failure(e.to_string())
                        }
                    };
                    let _ = to_app.send(last).await;
                    return;
                }
            };

            if to_app.send(event).await.is_err() {
                chat_debug!("Event receiver for session {} dropped, stopping reader", session_id);
                return;
            }
        }
    }

    async fn write_task(
        mut sink: SplitSink<WsStream, Message>,
        mut rx: Receiver<Outgoing>,
        flags: &CloseFlags,
        write_timeout: Duration,
        session_id: Uuid,
    ) -> Result<(), ClientError> {
        chat_debug!("Write task waiting for frames for session {}", session_id);

        while let Some(frame) = rx.recv().await {
            let (message, is_close) = match frame {
                Outgoing::Text(text) => (Message::Text(text), false),
                Outgoing::Binary(data) => (Message::Binary(data.to_vec()), false),
                Outgoing::Close { code, reason } => {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                    (Message::Close(Some(frame)), true)
                }
            };

            if flags.peer_closed.load(Ordering::Acquire) {
                chat_debug!("Peer closed session {}, dropping queued frame", session_id);
                if is_close {
                    return Ok(());
                }
                continue;
            }

            match tokio::time::timeout(write_timeout, sink.send(message)).await {
                Ok(Ok(())) => {}
                // the peer's close frame overtook this write
                Ok(Err(e))
                    if flags.peer_closed.load(Ordering::Acquire)
                        || (is_close && is_benign_after_close(&e)) =>
                {
                    chat_debug!("Write on closed session {} skipped: {}", session_id, e);
                    if is_close {
                        return Ok(());
                    }
                }
                Ok(Err(e)) => {
                    chat_error!("Error writing frame for session {}: {}", session_id, e);
                    return Err(ClientError::WebSocket(e));
                }
                Err(_) => {
                    chat_error!("Timeout writing frame for session {}", session_id);
                    return Err(ClientError::WriteTimeout);
                }
            }

            if is_close {
                chat_debug!("Close frame written for session {}, stopping writer", session_id);
                return Ok(());
            }
        }

        chat_debug!("Write channel closed, shutting down write task");
        Ok(())
    }
}

impl Drop for IoCore {
    fn drop(&mut self) {
        self.read_jh.abort();
    }
}

fn is_benign_after_close(e: &tungstenite::Error) -> bool {
    matches!(
        e,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(tungstenite::error::ProtocolError::SendAfterClosing)
    )
}
