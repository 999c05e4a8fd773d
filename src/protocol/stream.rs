//! Streaming layer - chunked transfer of oversized payloads.
//!
//! Payloads at or above the configured threshold are not sent as one
//! frame. The sender replaces the message with a sequence of reserved
//! sub-messages sharing the original message id:
//!
//! ```text
//! START (250)  StreamHeader { original_type, total_size, total_chunks }
//! CHUNK (251)  StreamChunk  { index, data }     repeated, in index order
//! END   (252)  empty payload
//! ```
//!
//! The receive side collects chunks per message id in a
//! [`StreamAssembler`] and reassembles the original payload once every
//! chunk is present. Chunks may arrive out of order; duplicates are
//! ignored rather than double-counted.

use std::collections::HashMap;

use crate::codec::payload::{PayloadDecode, PayloadEncode};
use crate::codec::primitives::{
    read_bytes, read_u32_varint, read_u8, read_varint, write_bytes, write_u32_varint, write_varint,
};
use crate::error::Result;

/// Payload size at which streaming kicks in by default (1 MiB).
pub const DEFAULT_STREAM_THRESHOLD: usize = 1024 * 1024;

/// Default size of one stream chunk (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Streaming configuration carried in
/// [`MessageOptions`](crate::MessageOptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Payload size at which streaming is used.
    pub threshold: usize,
    /// Size of each stream chunk.
    pub chunk_size: usize,
    /// Whether streaming is active at all.
    pub enabled: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_STREAM_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            enabled: true,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streaming turned off; every payload goes out as a single frame.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Chunk size is clamped to at least one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Metadata for a streamed message; payload of reserved type 250.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamHeader {
    /// Message type the reassembled payload will carry.
    pub original_type: u8,
    /// Total payload size in bytes.
    pub total_size: u64,
    /// Number of chunks that will follow.
    pub total_chunks: u32,
}

impl PayloadEncode for StreamHeader {
    fn marshal(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(16);
        buf.push(self.original_type);
        write_varint(&mut buf, self.total_size);
        write_u32_varint(&mut buf, self.total_chunks);
        Ok(buf)
    }
}

impl PayloadDecode for StreamHeader {
    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        let mut r = data;
        self.original_type = read_u8(&mut r)?;
        self.total_size = read_varint(&mut r)?;
        self.total_chunks = read_u32_varint(&mut r)?;
        Ok(())
    }
}

/// One slice of a streamed payload; payload of reserved type 251.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// Zero-based position of this chunk.
    pub index: u32,
    /// The chunk bytes.
    pub data: Vec<u8>,
}

impl PayloadEncode for StreamChunk {
    fn marshal(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(8 + self.data.len());
        write_u32_varint(&mut buf, self.index);
        write_bytes(&mut buf, &self.data);
        Ok(buf)
    }
}

impl PayloadDecode for StreamChunk {
    fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
        let mut r = data;
        self.index = read_u32_varint(&mut r)?;
        self.data = read_bytes(&mut r)?;
        Ok(())
    }
}

/// Receiver-side state for one in-flight stream.
///
/// Owned exclusively by the receive loop of the owning Protocol; created
/// on START, fed on each CHUNK, destroyed on completion.
#[derive(Debug)]
pub(crate) struct StreamAssembler {
    header: StreamHeader,
    chunks: HashMap<u32, Vec<u8>>,
    received: u32,
}

impl StreamAssembler {
    pub(crate) fn new(header: StreamHeader) -> Self {
        Self {
            header,
            chunks: HashMap::new(),
            received: 0,
        }
    }

    pub(crate) fn original_type(&self) -> u8 {
        self.header.original_type
    }

    /// Store a chunk and report whether the stream is now complete.
    ///
    /// Only the first arrival of an index counts toward completion; a
    /// resent chunk neither overwrites nor double-counts.
    pub(crate) fn insert(&mut self, chunk: StreamChunk) -> bool {
        if let std::collections::hash_map::Entry::Vacant(e) = self.chunks.entry(chunk.index) {
            e.insert(chunk.data);
            self.received += 1;
        }
        self.is_complete()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.received == self.header.total_chunks
    }

    /// Concatenate the chunks in index order.
    ///
    /// An out-of-range index counts toward completion but contributes
    /// nothing here, so such a stream yields a short payload.
    pub(crate) fn assemble(self) -> Vec<u8> {
        let total: usize = self.chunks.values().map(Vec::len).sum();
        let mut out = Vec::with_capacity(total);
        for i in 0..self.header.total_chunks {
            if let Some(chunk) = self.chunks.get(&i) {
                out.extend_from_slice(chunk);
            }
        }
        out
    }
}
