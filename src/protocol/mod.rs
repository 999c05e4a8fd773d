//! Protocol module - message codec, streaming layer, and engine.
//!
//! - [`wire`] - the framed message format and marshal/unmarshal entry
//!   points
//! - [`stream`] - chunked transfer of oversized payloads
//! - [`engine`] - the connection-bound [`Protocol`] send/receive engine

pub mod engine;
pub mod stream;
pub mod wire;

pub use engine::Protocol;
pub use stream::{
    StreamChunk, StreamConfig, StreamHeader, DEFAULT_CHUNK_SIZE, DEFAULT_STREAM_THRESHOLD,
};
pub use wire::{
    marshal, marshal_message, marshal_secure, marshal_with_id, unmarshal, unmarshal_into,
    unmarshal_message, unmarshal_secure, unmarshal_strict, Message, MessageOptions,
    MAX_FRAME_SIZE, MAX_HEADER_SIZE, MAX_PAYLOAD_SIZE, MIN_MESSAGE_SIZE, RESERVED_TYPE_MIN,
    TYPE_STREAM_CHUNK, TYPE_STREAM_END, TYPE_STREAM_START,
};
