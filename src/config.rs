use crate::client::error::ClientError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_URL: &str = "wss://echo.websocket.org/";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChatClientConfig {
    pub url: String,
    pub send_queue_capacity: usize,
    pub event_capacity: usize,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            send_queue_capacity: 100,
            event_capacity: 100,
            connect_timeout_ms: 10_000,
            write_timeout_ms: 5_000,
        }
    }
}

impl ChatClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Never zero; a zero-sized mpsc channel panics.
    pub fn send_queue_capacity(&self) -> usize {
        self.send_queue_capacity.max(1)
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

fn saturating_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
