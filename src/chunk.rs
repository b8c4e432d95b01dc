//! Host buffer representation of batched events.
//!
//! The host framework buffers formatted events between flushes. Each
//! event is MessagePack-encoded as a `(tag, timestamp, record)` triple
//! and the buffer is the plain concatenation of those frames; decoding
//! walks the buffer until it is exhausted. Hosts that decode their own
//! buffers can skip this module and hand [`Event`] slices straight to
//! the output.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while encoding or decoding buffered events.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// An event could not be encoded into the buffer format.
    #[error("failed to encode event: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    /// The buffer holds bytes that are not a valid event frame.
    #[error("failed to decode event: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// One tagged, timestamped record as delivered by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Routing tag assigned by the ingestion pipeline.
    pub tag: String,
    /// Time the record was emitted.
    pub timestamp: DateTime<Utc>,
    /// Structured record payload; only the `message` field is delivered.
    pub record: serde_json::Value,
}

impl Event {
    pub fn new(
        tag: impl Into<String>,
        timestamp: DateTime<Utc>,
        record: serde_json::Value,
    ) -> Self {
        Self {
            tag: tag.into(),
            timestamp,
            record,
        }
    }
}

/// Encode one event into its buffered wire frame.
pub fn format_event(event: &Event) -> Result<Vec<u8>, ChunkError> {
    Ok(rmp_serde::to_vec(event)?)
}

/// A buffer of concatenated encoded event frames.
#[derive(Clone, Debug, Default)]
pub struct Chunk {
    buf: Vec<u8>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already-buffered byte sequence produced by the host.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Append one encoded event frame.
    pub fn push(&mut self, frame: &[u8]) {
        self.buf.extend_from_slice(frame);
    }

    /// Encode `event` and append it.
    pub fn push_event(&mut self, event: &Event) -> Result<(), ChunkError> {
        let frame = format_event(event)?;
        self.push(&frame);
        Ok(())
    }

    /// Whether the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Decode every buffered event in order.
    pub fn events(&self) -> Result<Vec<Event>, ChunkError> {
        let mut cursor = Cursor::new(self.buf.as_slice());
        let mut events = Vec::new();
        while (cursor.position() as usize) < self.buf.len() {
            let mut de = rmp_serde::Deserializer::new(&mut cursor);
            events.push(Event::deserialize(&mut de)?);
        }
        Ok(events)
    }
}
