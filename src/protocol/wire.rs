//! Message codec - the framed wire format.
//!
//! One marshalled message is laid out as:
//!
//! ```text
//! ┌──────┬───────────┬───────────────────┬─────────┬─────────────┬───────────┐
//! │ type │ id        │ payload_len       │ payload │ sig_len     │ signature │
//! │ u8   │ varint    │ varint            │ N bytes │ varint      │ M bytes   │
//! └──────┴───────────┴───────────────────┴─────────┴─────────────┴───────────┘
//! ```
//!
//! `id`, `payload_len`, and `sig_len` are LEB128 varints. The signature,
//! when present, covers everything before the sig_len field (type, id,
//! payload_len, payload). Message types 250-255 are reserved for the
//! streaming protocol.
//!
//! The top-level [`marshal`]/[`unmarshal`] helpers use the process-wide
//! registry and id counter; [`marshal_message`]/[`unmarshal_message`]
//! take an explicit [`MessageOptions`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::{Buf, Bytes};

use crate::codec::payload::{
    marshal_payload, unmarshal_payload_with, PayloadDecode, PayloadEncode, PayloadValue,
};
use crate::codec::primitives::{read_u32_varint, read_u8, read_varint, write_varint};
use crate::crypto::{HmacSigner, HmacVerifier, RsaSigner, RsaVerifier, Signer, Verifier};
use crate::error::{Result, WireError};
use crate::protocol::stream::StreamConfig;
use crate::registry::{global_registry, PayloadRegistry};

/// Reserved message type: start of a streamed payload.
pub const TYPE_STREAM_START: u8 = 250;

/// Reserved message type: one chunk of a streamed payload.
pub const TYPE_STREAM_CHUNK: u8 = 251;

/// Reserved message type: end of a streamed payload.
pub const TYPE_STREAM_END: u8 = 252;

/// First message type reserved for internal use; [250, 255] is the
/// reserved range.
pub const RESERVED_TYPE_MIN: u8 = 250;

/// Maximum allowed payload size (100 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Largest possible encoded header: type byte plus two maximal varints.
pub const MAX_HEADER_SIZE: usize = 1 + 5 + 5;

/// Smallest possible message: type plus three single-byte varints.
pub const MIN_MESSAGE_SIZE: usize = 4;

/// Upper bound on one framed message, enforced on the inbound path:
/// maximal payload and header, sig-len varint, and signature slack.
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + MAX_HEADER_SIZE + 5 + 1024;

/// A parsed protocol message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Application message type, or a reserved type on the raw path.
    pub message_type: u8,
    /// Sender-chosen correlation id; preserved across chunking.
    pub id: u32,
    /// The payload bytes as carried on the wire.
    pub payload: Bytes,
    /// Signature bytes; empty when the wire carried sig_len = 0.
    pub signature: Bytes,
}

impl Message {
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

/// Optional settings for message handling.
///
/// The default has no signer or verifier, uses the global registry,
/// default streaming, and non-strict decoding.
#[derive(Clone, Default)]
pub struct MessageOptions {
    /// Signs every outbound message when present.
    pub signer: Option<Arc<dyn Signer>>,
    /// Verifies every inbound message when present; unsigned messages
    /// are then rejected.
    pub verifier: Option<Arc<dyn Verifier>>,
    /// Registry for payload decoding; the global registry when absent.
    pub registry: Option<Arc<PayloadRegistry>>,
    /// Streaming configuration for Protocol sends.
    pub stream: Option<StreamConfig>,
    /// Reject messages whose type has no registered factory.
    pub strict: bool,
}

impl MessageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// HMAC signing and verification with a shared secret.
    pub fn secure(secret: &[u8]) -> Self {
        Self {
            signer: Some(Arc::new(HmacSigner::new(secret))),
            verifier: Some(Arc::new(HmacVerifier::new(secret))),
            ..Self::default()
        }
    }

    /// HMAC signing plus strict payload decoding.
    pub fn secure_strict(secret: &[u8]) -> Self {
        Self {
            strict: true,
            ..Self::secure(secret)
        }
    }

    /// Strict payload decoding only.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// RSA signing with the private key and/or verification with the
    /// public key; either side may be omitted.
    pub fn rsa(
        private_key: Option<rsa::RsaPrivateKey>,
        public_key: Option<rsa::RsaPublicKey>,
    ) -> Self {
        Self {
            signer: private_key.map(|k| Arc::new(RsaSigner::new(k)) as Arc<dyn Signer>),
            verifier: public_key.map(|k| Arc::new(RsaVerifier::new(k)) as Arc<dyn Verifier>),
            ..Self::default()
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_registry(mut self, registry: Arc<PayloadRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream = Some(config);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub(crate) fn registry(&self) -> &PayloadRegistry {
        self.registry.as_deref().unwrap_or_else(|| global_registry())
    }
}

/// Serialize a message from pre-marshalled payload bytes.
pub(crate) fn marshal_message_raw(
    message_type: u8,
    id: u32,
    payload: &[u8],
    opts: &MessageOptions,
) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(WireError::PayloadTooLarge);
    }

    let mut buf = Vec::with_capacity(MAX_HEADER_SIZE + payload.len() + 64);
    buf.push(message_type);
    write_varint(&mut buf, u64::from(id));
    write_varint(&mut buf, payload.len() as u64);
    buf.extend_from_slice(payload);

    match &opts.signer {
        Some(signer) => {
            let signature = signer.sign(&buf)?;
            write_varint(&mut buf, signature.len() as u64);
            buf.extend_from_slice(&signature);
        }
        None => write_varint(&mut buf, 0),
    }

    Ok(buf)
}

/// Serialize a message with header and payload into binary form.
///
/// The payload is serialized through its marshal capability; with a
/// signer configured, the signature covers header and payload.
pub fn marshal_message<P: PayloadEncode + ?Sized>(
    message_type: u8,
    id: u32,
    payload: &P,
    opts: &MessageOptions,
) -> Result<Vec<u8>> {
    let payload_bytes = marshal_payload(payload)?;
    marshal_message_raw(message_type, id, &payload_bytes, opts)
}

/// Deserialize a binary message into its components.
///
/// With a verifier configured, an unsigned message fails with
/// [`WireError::SignatureRequired`] and a bad signature with
/// [`WireError::InvalidSignature`]. The payload is decoded through the
/// registry; see [`PayloadValue`] for the two outcomes.
pub fn unmarshal_message(data: &[u8], opts: &MessageOptions) -> Result<(Message, PayloadValue)> {
    if data.len() < MIN_MESSAGE_SIZE {
        return Err(WireError::InvalidMessage);
    }

    let mut r = data;
    let message_type = read_u8(&mut r)?;
    let id = read_u32_varint(&mut r)?;

    let payload_len = read_varint(&mut r)?;
    if payload_len > MAX_PAYLOAD_SIZE as u64 {
        return Err(WireError::PayloadTooLarge);
    }
    let payload_len = payload_len as usize;
    if r.remaining() < payload_len {
        return Err(WireError::InvalidMessage);
    }
    let payload = Bytes::copy_from_slice(&r[..payload_len]);
    r.advance(payload_len);

    // Everything before the sig_len field is the signed range.
    let signed_len = data.len() - r.remaining();

    let sig_len = read_varint(&mut r)? as usize;
    if r.remaining() < sig_len {
        return Err(WireError::InvalidMessage);
    }
    let signature = Bytes::copy_from_slice(&r[..sig_len]);

    if let Some(verifier) = &opts.verifier {
        if signature.is_empty() {
            return Err(WireError::SignatureRequired);
        }
        verifier
            .verify(&data[..signed_len], &signature)
            .map_err(|_| WireError::InvalidSignature)?;
    }

    // Strict mode governs application types only; the reserved control
    // range is owned by the framework and always decodes.
    let strict = opts.strict && message_type < RESERVED_TYPE_MIN;
    let value = unmarshal_payload_with(opts.registry(), message_type, &payload, strict)?;

    Ok((
        Message {
            message_type,
            id,
            payload,
            signature,
        },
        value,
    ))
}

static NEXT_MESSAGE_ID: AtomicU32 = AtomicU32::new(0);

/// Next id from the process-wide counter used by the top-level helpers.
pub(crate) fn next_global_message_id() -> u32 {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}

/// Serialize a payload with an auto-generated message id.
///
/// The simplest way to produce a binary message for transmission over
/// any transport.
pub fn marshal<P: PayloadEncode + ?Sized>(message_type: u8, payload: &P) -> Result<Vec<u8>> {
    marshal_message(
        message_type,
        next_global_message_id(),
        payload,
        &MessageOptions::default(),
    )
}

/// Serialize a payload with a specific message id, for correlating
/// request/response pairs.
pub fn marshal_with_id<P: PayloadEncode + ?Sized>(
    message_type: u8,
    id: u32,
    payload: &P,
) -> Result<Vec<u8>> {
    marshal_message(message_type, id, payload, &MessageOptions::default())
}

/// Serialize with HMAC signing; the same secret must verify it.
pub fn marshal_secure<P: PayloadEncode + ?Sized>(
    message_type: u8,
    payload: &P,
    secret: &[u8],
) -> Result<Vec<u8>> {
    marshal_message(
        message_type,
        next_global_message_id(),
        payload,
        &MessageOptions::secure(secret),
    )
}

/// Deserialize a binary message with default options.
pub fn unmarshal(data: &[u8]) -> Result<(Message, PayloadValue)> {
    unmarshal_message(data, &MessageOptions::default())
}

/// Deserialize and verify an HMAC-signed message.
pub fn unmarshal_secure(data: &[u8], secret: &[u8]) -> Result<(Message, PayloadValue)> {
    unmarshal_message(data, &MessageOptions::secure(secret))
}

/// Deserialize rejecting unregistered message types.
pub fn unmarshal_strict(data: &[u8]) -> Result<(Message, PayloadValue)> {
    unmarshal_message(data, &MessageOptions::strict())
}

/// Deserialize the payload directly into an existing decoder.
pub fn unmarshal_into<P: PayloadDecode>(data: &[u8], target: &mut P) -> Result<Message> {
    let (msg, _) = unmarshal_message(data, &MessageOptions::default())?;
    target.unmarshal(&msg.payload)?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::primitives::{read_string, write_string};
    use crate::error::Result;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Login {
        username: String,
        password: String,
    }

    impl PayloadEncode for Login {
        fn marshal(&self) -> Result<Vec<u8>> {
            let mut buf = Vec::new();
            write_string(&mut buf, &self.username);
            write_string(&mut buf, &self.password);
            Ok(buf)
        }
    }

    impl PayloadDecode for Login {
        fn unmarshal(&mut self, data: &[u8]) -> Result<()> {
            let mut r = data;
            self.username = read_string(&mut r)?;
            self.password = read_string(&mut r)?;
            Ok(())
        }
    }

    fn login_options() -> MessageOptions {
        let registry = PayloadRegistry::new();
        registry.register_type::<Login>(1);
        MessageOptions::new().with_registry(Arc::new(registry))
    }

    fn sample_login() -> Login {
        Login {
            username: "testuser".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn test_message_roundtrip() {
        let opts = login_options();
        let data = marshal_message(1, 42, &sample_login(), &opts).unwrap();

        let (msg, value) = unmarshal_message(&data, &opts).unwrap();
        assert_eq!(msg.message_type, 1);
        assert_eq!(msg.id, 42);
        assert!(!msg.is_signed());
        assert_eq!(value.downcast_ref::<Login>().unwrap(), &sample_login());
    }

    #[test]
    fn test_raw_bytes_roundtrip() {
        let payload = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let data = marshal_message(200, 1, &payload, &MessageOptions::new()).unwrap();

        let (msg, value) = unmarshal(&data).unwrap();
        assert_eq!(msg.message_type, 200);
        assert_eq!(&msg.payload[..], &payload[..]);
        assert_eq!(value.raw(), Some(&payload[..]));
    }

    #[test]
    fn test_empty_payload() {
        let data = marshal_message(200, 1, &(), &MessageOptions::new()).unwrap();
        assert_eq!(data.len(), 4); // type + three single-byte varints

        let (msg, value) = unmarshal(&data).unwrap();
        assert!(msg.payload.is_empty());
        assert_eq!(value.raw(), Some(&[][..]));
    }

    #[test]
    fn test_signed_roundtrip() {
        let opts = MessageOptions::secure(b"shared");
        let data = marshal_message(2, 7, &b"hello"[..], &opts).unwrap();

        let (msg, _) = unmarshal_message(&data, &opts).unwrap();
        assert!(msg.is_signed());
        assert_eq!(msg.signature.len(), 32);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let data = marshal_message(2, 7, &b"hello"[..], &MessageOptions::secure(b"one")).unwrap();
        let result = unmarshal_message(&data, &MessageOptions::secure(b"two"));
        assert!(matches!(result, Err(WireError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let opts = MessageOptions::secure(b"shared");
        let mut data = marshal_message(2, 7, &b"hello world"[..], &opts).unwrap();

        // Flip a byte inside the payload.
        data[6] ^= 0xFF;
        let result = unmarshal_message(&data, &opts);
        assert!(matches!(result, Err(WireError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_signature_fails() {
        let opts = MessageOptions::secure(b"shared");
        let mut data = marshal_message(2, 7, &b"hello"[..], &opts).unwrap();

        let last = data.len() - 1;
        data[last] ^= 0xFF;
        let result = unmarshal_message(&data, &opts);
        assert!(matches!(result, Err(WireError::InvalidSignature)));
    }

    #[test]
    fn test_unsigned_message_with_verifier_fails() {
        let data = marshal_message(2, 7, &b"hello"[..], &MessageOptions::new()).unwrap();
        let result = unmarshal_message(&data, &MessageOptions::secure(b"shared"));
        assert!(matches!(result, Err(WireError::SignatureRequired)));
    }

    #[test]
    fn test_signing_is_orthogonal_to_strict() {
        // A signed message for an unregistered type still passes through
        // in non-strict mode.
        let opts = MessageOptions::secure(b"shared");
        let data = marshal_message(200, 1, &b"raw"[..], &opts).unwrap();
        let (_, value) = unmarshal_message(&data, &opts).unwrap();
        assert!(value.is_raw());
    }

    #[test]
    fn test_strict_ignores_reserved_control_types() {
        // STREAM_END has no registered factory; strict mode must not
        // reject it or streamed transfers would die mid-flight.
        let data = marshal_message(TYPE_STREAM_END, 1, &(), &MessageOptions::new()).unwrap();
        let (msg, value) = unmarshal_strict(&data).unwrap();
        assert_eq!(msg.message_type, TYPE_STREAM_END);
        assert!(value.is_raw());
    }

    #[test]
    fn test_strict_rejects_unknown_type() {
        let data = marshal_message(200, 1, &b"raw"[..], &MessageOptions::new()).unwrap();

        let (_, value) = unmarshal(&data).unwrap();
        assert_eq!(value.raw(), Some(&b"raw"[..]));

        let result = unmarshal_strict(&data);
        assert!(matches!(result, Err(WireError::UnknownMessageType(200))));
    }

    #[test]
    fn test_too_short_data() {
        assert!(matches!(
            unmarshal(&[1, 0, 0]),
            Err(WireError::InvalidMessage)
        ));
        assert!(matches!(unmarshal(&[]), Err(WireError::InvalidMessage)));
    }

    #[test]
    fn test_truncated_payload() {
        let mut data = Vec::new();
        data.push(1u8);
        write_varint(&mut data, 1); // id
        write_varint(&mut data, 100); // claims 100 payload bytes
        data.extend_from_slice(b"short");
        assert!(matches!(
            unmarshal(&data),
            Err(WireError::InvalidMessage)
        ));
    }

    #[test]
    fn test_declared_payload_over_bound() {
        let mut data = Vec::new();
        data.push(1u8);
        write_varint(&mut data, 1);
        write_varint(&mut data, MAX_PAYLOAD_SIZE as u64 + 1);
        data.push(0);
        assert!(matches!(
            unmarshal(&data),
            Err(WireError::PayloadTooLarge)
        ));
    }

    #[test]
    fn test_oversized_payload_rejected_on_marshal() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let result = marshal_message(1, 1, &payload, &MessageOptions::new());
        assert!(matches!(result, Err(WireError::PayloadTooLarge)));
    }

    #[test]
    fn test_marshal_secure_unmarshal_secure() {
        let opts = login_options();
        let registry = opts.registry.clone().unwrap();

        let secret = b"my-secret-key";
        let mut secure = MessageOptions::secure(secret);
        secure.registry = Some(registry);

        let data = marshal_message(1, 9, &sample_login(), &secure).unwrap();
        let (msg, value) = unmarshal_message(&data, &secure).unwrap();
        assert!(msg.is_signed());
        assert_eq!(value.downcast_ref::<Login>().unwrap(), &sample_login());
    }

    #[test]
    fn test_unmarshal_into() {
        let data = marshal_with_id(77, 13, &sample_login()).unwrap();

        let mut target = Login::default();
        let msg = unmarshal_into(&data, &mut target).unwrap();
        assert_eq!(msg.message_type, 77);
        assert_eq!(msg.id, 13);
        assert_eq!(target, sample_login());
    }

    #[test]
    fn test_global_ids_increase() {
        let a = marshal(200, &b"x"[..]).unwrap();
        let b = marshal(200, &b"x"[..]).unwrap();
        let (msg_a, _) = unmarshal(&a).unwrap();
        let (msg_b, _) = unmarshal(&b).unwrap();
        assert!(msg_b.id > msg_a.id);
    }

    #[test]
    fn test_large_id_varint() {
        let data = marshal_with_id(5, u32::MAX, &b"x"[..]).unwrap();
        let (msg, _) = unmarshal(&data).unwrap();
        assert_eq!(msg.id, u32::MAX);
    }
}
