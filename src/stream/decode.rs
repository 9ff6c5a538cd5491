//! Decoding of stream payloads
//!
//! Each SSE event carries one JSON object: either a heartbeat
//! (`{"heartbeat": true}`) or a sample (`{"rms": .., "max": .., "crest": ..}`).
//! [`StreamDecoder`] turns payloads into samples, drops heartbeats and
//! malformed messages, and keeps the counters shown in the status bar.

use crate::error::{Result, VibMonError};
use crate::types::{Sample, StreamStats};
use serde::Deserialize;

/// A decoded stream message
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Keep-alive without payload
    Heartbeat,
    /// Telemetry reading
    Sample(Sample),
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    heartbeat: bool,
    #[serde(flatten)]
    sample: Sample,
}

/// Parse one event payload
pub fn decode_message(data: &str) -> Result<StreamMessage> {
    let wire: WireMessage = serde_json::from_str(data.trim())
        .map_err(|e| VibMonError::Decode(format!("{} in {:?}", e, truncate(data, 64))))?;

    if wire.heartbeat {
        Ok(StreamMessage::Heartbeat)
    } else {
        Ok(StreamMessage::Sample(wire.sample))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Stateful decoder for one connection
#[derive(Debug, Default)]
pub struct StreamDecoder {
    next_seq: u64,
    stats: StreamStats,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a payload, returning the sample to forward, if any
    ///
    /// Heartbeats and malformed payloads yield `None`. Forwarded samples are
    /// numbered in arrival order.
    pub fn handle(&mut self, data: &str) -> Option<Sample> {
        self.stats.messages += 1;
        match decode_message(data) {
            Ok(StreamMessage::Heartbeat) => {
                self.stats.heartbeats += 1;
                tracing::trace!("Heartbeat");
                None
            }
            Ok(StreamMessage::Sample(sample)) => {
                let sample = sample.with_seq(self.next_seq);
                self.next_seq += 1;
                self.stats.samples += 1;
                Some(sample)
            }
            Err(e) => {
                self.stats.decode_failures += 1;
                tracing::warn!("Dropping stream message: {}", e);
                None
            }
        }
    }

    /// Count a message that never reached JSON decoding
    pub fn reject(&mut self, reason: &str) {
        self.stats.messages += 1;
        self.stats.decode_failures += 1;
        tracing::warn!("Dropping stream message: {}", reason);
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }
}
