//! src/client/error.rs

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Collective error type for everything that can go wrong on the client side.
#[derive(Debug, Error)]
pub enum ClientError {
    /* ───────────── Connect / Handshake ───────────── */
    #[error("Invalid WebSocket URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Timeout connecting to {0}")]
    ConnectTimeout(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /* ───────────── Write side ───────────── */
    #[error("Timeout writing to socket")]
    WriteTimeout,

    #[error("Send queue is full")]
    QueueFull,

    #[error("Write task is gone, connection closed")]
    ChannelClosed,

    #[error("Connection is closing, no more frames accepted")]
    Closing,

    /* ───────────── Configuration ───────────── */
    #[error("Config error: {0}")]
    Config(String),
}
