//! Decides how a line typed by the user goes on the wire.
//!
//! A line of the form `<decimal> = 0x<hex>` whose two literals name the same
//! value in `0..=255` is sent as that single byte in a binary frame. Every
//! other line, including near misses, is sent verbatim as a text frame.

use regex::Regex;
use std::sync::LazyLock;

static BYTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*=\s*0x([0-9a-fA-F]+)$").expect("byte pattern is a valid regex")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Byte(u8),
}

impl OutboundFrame {
    pub fn is_binary(&self) -> bool {
        matches!(self, OutboundFrame::Byte(_))
    }
}

/// Classifies an already-trimmed, non-empty line. Never fails.
pub fn classify(input: &str) -> OutboundFrame {
    match encoded_byte(input) {
        Some(value) => OutboundFrame::Byte(value),
        None => OutboundFrame::Text(input.to_string()),
    }
}

fn encoded_byte(input: &str) -> Option<u8> {
    let caps = BYTE_PATTERN.captures(input)?;
    let decimal = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let hex = u64::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;

    if decimal != hex {
        return None;
    }
    u8::try_from(decimal).ok()
}
