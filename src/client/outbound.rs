use super::*;
use crate::client::error::ClientError;
use crate::client::io_core::Outgoing;
use crate::message::InboundEvent;
use crate::{chat_debug, chat_info, ChatClientConfig};
use bytes::Bytes;
use tokio::sync::mpsc::{self, Receiver};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use uuid::Uuid;

/// One WebSocket connection, opened by us.
pub struct ChatClient {
    core: IoCore,
}

impl ChatClient {
    /// Performs the handshake and starts the reader and writer tasks.
    ///
    /// The returned receiver yields `InboundEvent::Open` first, then every
    /// frame in arrival order, and ends with a `Closed` or `Failure` event.
    pub async fn connect(
        cfg: &ChatClientConfig,
    ) -> Result<(Self, Receiver<InboundEvent>), ClientError> {
        let url = cfg.url().to_string();
        let request = url.as_str().into_client_request().map_err(|e| ClientError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let (ws, response) =
            tokio::time::timeout(cfg.connect_timeout(), tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| ClientError::ConnectTimeout(url.clone()))??;
        chat_info!("Connected to {} ({})", url, response.status());

        let (app_tx, app_rx) = mpsc::channel::<InboundEvent>(cfg.event_capacity());
        let core = IoCore::new(ws, url, app_tx, cfg.send_queue_capacity(), cfg.write_timeout());

        Ok((Self { core }, app_rx))
    }

    #[inline] pub fn id(&self) -> Uuid          { self.core.id }
    #[inline] pub fn url(&self) -> &str         { &self.core.url }
    #[inline] pub fn is_alive(&self) -> bool    { self.core.is_alive() }
    #[inline] pub fn is_closing(&self) -> bool  { self.core.is_closing() }
}

impl Transport for ChatClient {
    fn send_text(&self, text: &str) -> Result<(), ClientError> {
        chat_debug!("Queueing text frame for {} ({} bytes)", self.core.id, text.len());
        self.core.try_send(Outgoing::Text(text.to_string()))
    }

    fn send_binary(&self, payload: Bytes) -> Result<(), ClientError> {
        chat_debug!("Queueing binary frame for {}: {}", self.core.id, hex::encode(&payload));
        self.core.try_send(Outgoing::Binary(payload))
    }

    fn close(&self, code: u16, reason: &str) -> Result<(), ClientError> {
        chat_info!("Closing session {} ({code}: {reason})", self.core.id);
        self.core.close(code, reason)
    }
}
