pub mod chat_log;
pub mod classifier;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod message;
pub mod session;

/* Re-exports */
pub use classifier::{classify, OutboundFrame};
pub use client::{ChatClient, ClientError, Transport};
pub use config::ChatClientConfig;
pub use dispatcher::{ConnectionState, Dispatch, Dispatcher};
pub use message::{ChatMessage, Direction, InboundEvent, MessageHistory};
pub use session::{ChatSession, SubmitError, SubmitOutcome};
