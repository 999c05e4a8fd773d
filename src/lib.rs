//! # tagwire
//!
//! A binary protocol framework for length-delimited, typed, optionally
//! signed messages over any bidirectional byte stream.
//!
//! tagwire is a framework: it provides the protocol infrastructure
//! (framing, marshal/unmarshal, signing, transparent streaming of large
//! payloads) and applications define their own message types.
//!
//! ## Architecture
//!
//! - **Primitive codec** ([`codec::primitives`]): varint and
//!   length-prefixed reads/writes payload types are built from
//! - **Payload registry** ([`registry`]): message-type byte → decoder
//!   factory, with the reserved range [250, 255] protected
//! - **Message codec** ([`protocol::wire`]): the framed wire format with
//!   optional HMAC or RSA signatures
//! - **Streaming** ([`protocol::stream`]): payloads over the threshold
//!   are split into chunks and reassembled transparently
//! - **Engine** ([`protocol::engine`]): a [`Protocol`] binds the codec
//!   to one transport, safe for concurrent senders plus a receive loop
//!
//! ## Example
//!
//! ```ignore
//! use tagwire::{register_payload_type, Client, MessageOptions, Protocol};
//! use tokio::net::TcpStream;
//!
//! const MSG_LOGIN: u8 = 1;
//! register_payload_type::<LoginPayload>(MSG_LOGIN);
//!
//! let conn = TcpStream::connect("127.0.0.1:7500").await?;
//! let proto = Protocol::new(conn, MessageOptions::secure(b"shared-secret"));
//!
//! proto.send(MSG_LOGIN, &LoginPayload::new("user", "pass")).await?;
//! let (msg, payload) = proto.receive_message().await?;
//! ```

pub mod client;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use client::{Client, MessageHandler};
pub use codec::{AsAny, PayloadDecode, PayloadEncode, PayloadValue};
pub use crypto::{
    generate_rsa_key_pair, HmacSigner, HmacVerifier, RsaSigner, RsaVerifier, Signer, Verifier,
};
pub use error::{Result, WireError};
pub use protocol::{
    marshal, marshal_message, marshal_secure, marshal_with_id, unmarshal, unmarshal_into,
    unmarshal_message, unmarshal_secure, unmarshal_strict, Message, MessageOptions, Protocol,
    StreamChunk, StreamConfig, StreamHeader, MAX_PAYLOAD_SIZE, TYPE_STREAM_CHUNK,
    TYPE_STREAM_END, TYPE_STREAM_START,
};
pub use registry::{
    global_registry, has_payload_type, is_reserved_type, payload_factory, register_payload_type,
    unregister_payload_type, PayloadFactory, PayloadRegistry,
};
pub use server::Server;
pub use transport::{Listener, Transport};
