pub mod io_core;
pub mod outbound;
pub mod error;
/* internes Low-Level-Kernstück ─ nur crate-weit sichtbar */
pub(crate) use io_core::IoCore;

/* öffentliche Typen, die andere nutzen sollen */
pub use error::ClientError;
pub use outbound::ChatClient;

use bytes::Bytes;

/// Sending half of a chat connection.
///
/// Every method returns immediately: `Ok` means the frame was queued for
/// the wire, `Err` means it was not. Neither says anything about delivery.
pub trait Transport: Send + Sync {
    fn send_text(&self, text: &str) -> Result<(), ClientError>;

    fn send_binary(&self, payload: Bytes) -> Result<(), ClientError>;

    fn close(&self, code: u16, reason: &str) -> Result<(), ClientError>;
}
