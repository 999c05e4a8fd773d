//! Error types for tagwire.

use thiserror::Error;

/// Main error type for all tagwire operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame shorter than the minimal header or malformed varints.
    #[error("invalid message format")]
    InvalidMessage,

    /// Payload or declared frame length exceeds the 100 MiB bound.
    #[error("payload exceeds maximum size")]
    PayloadTooLarge,

    /// Length-prefixed string exceeds the 1 MiB bound.
    #[error("invalid string length")]
    InvalidStringLen,

    /// Length-prefixed byte slice exceeds the 1 GiB bound.
    #[error("invalid bytes length")]
    InvalidBytesLen,

    /// Varint continuation ran past 63 bits of shift, or a decoded
    /// value did not fit the requested integer width.
    #[error("varint overflow")]
    VarintOverflow,

    /// A verifier is configured but the wire carried no signature.
    #[error("signature required but not present")]
    SignatureRequired,

    /// The configured verifier rejected the signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// Strict mode and no factory registered for the message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// A payload did not decode to the type its tag promises.
    #[error("invalid payload for message type {0}")]
    InvalidPayloadType(u8),

    /// A stream ended with chunks still missing.
    #[error("stream was interrupted")]
    StreamInterrupted,

    /// Signing or key-generation failure.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The transport closed cleanly on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// I/O error from the transport or a short read in the codec.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using WireError.
pub type Result<T> = std::result::Result<T, WireError>;
