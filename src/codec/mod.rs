//! Codec module - serialization primitives and payload capabilities.
//!
//! This module provides the building blocks payload types are written
//! with:
//!
//! - [`primitives`] - varint, length-prefixed, and fixed-width reads/writes
//! - [`payload`] - the [`PayloadEncode`]/[`PayloadDecode`] capability pair
//!   and the [`PayloadValue`] sum type returned by decoding
//!
//! # Example
//!
//! ```
//! use tagwire::codec::primitives::{read_string, write_string};
//! use tagwire::{PayloadDecode, PayloadEncode};
//!
//! #[derive(Default)]
//! struct Login {
//!     username: String,
//! }
//!
//! impl PayloadEncode for Login {
//!     fn marshal(&self) -> tagwire::Result<Vec<u8>> {
//!         let mut buf = Vec::new();
//!         write_string(&mut buf, &self.username);
//!         Ok(buf)
//!     }
//! }
//!
//! impl PayloadDecode for Login {
//!     fn unmarshal(&mut self, data: &[u8]) -> tagwire::Result<()> {
//!         let mut r = data;
//!         self.username = read_string(&mut r)?;
//!         Ok(())
//!     }
//! }
//! ```

pub mod payload;
pub mod primitives;

pub use payload::{
    marshal_payload, unmarshal_payload, unmarshal_payload_with, AsAny, PayloadDecode,
    PayloadEncode, PayloadValue,
};
