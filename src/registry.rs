//! Payload registry - maps message-type tags to decoder factories.
//!
//! The registry is safe for concurrent reads from the decode path while
//! registrations happen from other tasks; registering during active
//! decodes guarantees nothing stronger than eventual visibility.
//!
//! Types 250-255 are reserved for the internal streaming protocol. The
//! registry pre-installs decoders for 250 (stream header) and 251 (stream
//! chunk); attempts to register or unregister any reserved type are
//! silently ignored.
//!
//! A process-wide registry backs the top-level [`marshal`](crate::marshal)
//! / [`unmarshal`](crate::unmarshal) entry points; additional registries
//! can be created and passed through
//! [`MessageOptions`](crate::MessageOptions).
//!
//! # Example
//!
//! ```
//! use tagwire::registry::PayloadRegistry;
//!
//! let registry = PayloadRegistry::new();
//! assert!(registry.has(250));
//! assert!(registry.has(251));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::codec::payload::PayloadDecode;
use crate::protocol::stream::{StreamChunk, StreamHeader};
use crate::protocol::wire::{RESERVED_TYPE_MIN, TYPE_STREAM_CHUNK, TYPE_STREAM_START};

/// Creates a fresh decoder instance for a payload type.
pub type PayloadFactory = Arc<dyn Fn() -> Box<dyn PayloadDecode> + Send + Sync>;

/// Returns true if the message type is reserved for internal use.
pub fn is_reserved_type(message_type: u8) -> bool {
    message_type >= RESERVED_TYPE_MIN
}

fn factory_of<P>() -> PayloadFactory
where
    P: PayloadDecode + Default + 'static,
{
    Arc::new(|| Box::<P>::default() as Box<dyn PayloadDecode>)
}

/// Concurrent mapping from message-type byte to decoder factory.
pub struct PayloadRegistry {
    factories: RwLock<HashMap<u8, PayloadFactory>>,
}

impl PayloadRegistry {
    /// Create a registry with the internal streaming types pre-installed.
    pub fn new() -> Self {
        let mut factories: HashMap<u8, PayloadFactory> = HashMap::new();
        factories.insert(TYPE_STREAM_START, factory_of::<StreamHeader>());
        factories.insert(TYPE_STREAM_CHUNK, factory_of::<StreamChunk>());
        Self {
            factories: RwLock::new(factories),
        }
    }

    /// Add or replace the factory for a message type.
    ///
    /// Attempts to register a reserved type are silently ignored.
    pub fn register(&self, message_type: u8, factory: PayloadFactory) {
        if is_reserved_type(message_type) {
            return;
        }
        self.factories.write().insert(message_type, factory);
    }

    /// Register a `Default`-constructible payload type.
    pub fn register_type<P>(&self, message_type: u8)
    where
        P: PayloadDecode + Default + 'static,
    {
        self.register(message_type, factory_of::<P>());
    }

    /// Remove the factory for a message type.
    ///
    /// Reserved types cannot be unregistered.
    pub fn unregister(&self, message_type: u8) {
        if is_reserved_type(message_type) {
            return;
        }
        self.factories.write().remove(&message_type);
    }

    /// The factory for a message type, if one is registered.
    pub fn get(&self, message_type: u8) -> Option<PayloadFactory> {
        self.factories.read().get(&message_type).cloned()
    }

    /// Whether a factory is registered for a message type.
    pub fn has(&self, message_type: u8) -> bool {
        self.factories.read().contains_key(&message_type)
    }
}

impl Default for PayloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: Lazy<PayloadRegistry> = Lazy::new(PayloadRegistry::new);

/// The process-wide registry used by the default marshal/unmarshal
/// entry points. Initialised lazily on first use.
pub fn global_registry() -> &'static PayloadRegistry {
    &GLOBAL_REGISTRY
}

/// Register a payload type with the global registry.
pub fn register_payload_type<P>(message_type: u8)
where
    P: PayloadDecode + Default + 'static,
{
    global_registry().register_type::<P>(message_type);
}

/// Remove a payload type from the global registry.
pub fn unregister_payload_type(message_type: u8) {
    global_registry().unregister(message_type);
}

/// The global registry's factory for a message type.
pub fn payload_factory(message_type: u8) -> Option<PayloadFactory> {
    global_registry().get(message_type)
}

/// Whether the global registry knows a message type.
pub fn has_payload_type(message_type: u8) -> bool {
    global_registry().has(message_type)
}
