//! Payload capabilities - marshal/unmarshal traits and the decoded value.
//!
//! User payload types implement [`PayloadEncode`] to serialize and
//! [`PayloadDecode`] to deserialize. Raw byte slices pass through both
//! directions untouched, and the unit type `()` marshals to an empty
//! payload.
//!
//! Decoding goes through a [`PayloadRegistry`](crate::registry::PayloadRegistry):
//! a registered factory produces a fresh decoder and the result is a
//! [`PayloadValue::Decoded`]; an unregistered type falls back to
//! [`PayloadValue::Raw`] unless strict mode rejects it.

use std::any::Any;
use std::fmt;

use bytes::Bytes;

use crate::error::{Result, WireError};
use crate::registry::PayloadRegistry;

/// Serialization capability for payload types.
pub trait PayloadEncode {
    /// Serialize this payload to its binary form.
    fn marshal(&self) -> Result<Vec<u8>>;
}

/// Deserialization capability for payload types.
///
/// Decoder factories produce fresh instances of implementors; the
/// registry then calls `unmarshal` with the received payload bytes.
pub trait PayloadDecode: AsAny + Send {
    /// Populate this payload from its binary form.
    fn unmarshal(&mut self, data: &[u8]) -> Result<()>;
}

/// Upcast support so decoded payloads can be recovered as concrete types.
///
/// Blanket-implemented for every `'static` type; implementors of
/// [`PayloadDecode`] get it for free.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl PayloadEncode for [u8] {
    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

impl PayloadEncode for Vec<u8> {
    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }
}

impl PayloadEncode for Bytes {
    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(self.to_vec())
    }
}

/// The empty payload.
impl PayloadEncode for () {
    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// A decoded payload: either a registered type or raw pass-through bytes.
pub enum PayloadValue {
    /// No factory was registered for the message type; the bytes are
    /// returned as received.
    Raw(Bytes),
    /// A registered factory decoded the payload.
    Decoded(Box<dyn PayloadDecode>),
}

impl PayloadValue {
    /// The raw bytes, if this is a pass-through value.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            PayloadValue::Raw(b) => Some(b),
            PayloadValue::Decoded(_) => None,
        }
    }

    /// Borrow the decoded payload as a concrete type.
    pub fn downcast_ref<P: Any>(&self) -> Option<&P> {
        match self {
            PayloadValue::Decoded(p) => p.as_any().downcast_ref(),
            PayloadValue::Raw(_) => None,
        }
    }

    /// Take ownership of the decoded payload as a concrete type.
    pub fn downcast<P: Any>(self) -> Option<Box<P>> {
        match self {
            PayloadValue::Decoded(p) => p.into_any().downcast().ok(),
            PayloadValue::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, PayloadValue::Raw(_))
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, PayloadValue::Decoded(_))
    }
}

impl fmt::Debug for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Raw(b) => f.debug_tuple("Raw").field(&b.len()).finish(),
            PayloadValue::Decoded(_) => f.write_str("Decoded(..)"),
        }
    }
}

/// Serialize a payload through its marshal capability.
pub fn marshal_payload<P: PayloadEncode + ?Sized>(payload: &P) -> Result<Vec<u8>> {
    payload.marshal()
}

/// Decode payload bytes for a message type through a specific registry.
///
/// In strict mode an unregistered type is an error; otherwise the bytes
/// pass through as [`PayloadValue::Raw`].
pub fn unmarshal_payload_with(
    registry: &PayloadRegistry,
    message_type: u8,
    data: &[u8],
    strict: bool,
) -> Result<PayloadValue> {
    if let Some(factory) = registry.get(message_type) {
        let mut decoder = factory();
        decoder.unmarshal(data)?;
        return Ok(PayloadValue::Decoded(decoder));
    }

    if strict {
        return Err(WireError::UnknownMessageType(message_type));
    }

    Ok(PayloadValue::Raw(Bytes::copy_from_slice(data)))
}

/// Decode payload bytes through the global registry (non-strict).
pub fn unmarshal_payload(message_type: u8, data: &[u8]) -> Result<PayloadValue> {
    unmarshal_payload_with(crate::registry::global_registry(), message_type, data, false)
}
