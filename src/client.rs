//! Client - per-connection façade over a [`Protocol`].
//!
//! [`Client::start`] wraps a transport in a Protocol and spawns the
//! receive loop; each logical message is handed to the message handler.
//! The handler runs on the receive task, so it must not block for long
//! and must not call back into the same Protocol's receive path.
//!
//! # Example
//!
//! ```ignore
//! use tagwire::{Client, MessageOptions};
//! use tokio::net::TcpStream;
//!
//! let conn = TcpStream::connect("127.0.0.1:7500").await?;
//! let client = Client::start(conn, MessageOptions::new(), |msg, _payload| {
//!     println!("got message type {} id {}", msg.message_type, msg.id);
//! });
//!
//! client.send(1, &b"hello"[..]).await?;
//! client.wait_for_shutdown().await?;
//! ```

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::codec::payload::{PayloadEncode, PayloadValue};
use crate::error::{Result, WireError};
use crate::protocol::wire::{Message, MessageOptions};
use crate::protocol::Protocol;
use crate::transport::Transport;

/// Called for every received logical message.
pub type MessageHandler = dyn Fn(Message, PayloadValue) + Send + Sync;

/// A running connection with a background receive loop.
pub struct Client<C: Transport + 'static> {
    proto: Arc<Protocol<C>>,
    shutdown_rx: oneshot::Receiver<Option<WireError>>,
}

impl<C: Transport + 'static> Client<C> {
    /// Wrap a transport and start the receive loop.
    pub fn start<H>(conn: C, opts: MessageOptions, handler: H) -> Self
    where
        H: Fn(Message, PayloadValue) + Send + Sync + 'static,
    {
        let proto = Arc::new(Protocol::new(conn, opts));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let loop_proto = proto.clone();
        tokio::spawn(async move {
            let err = match Self::listen(&loop_proto, &handler).await {
                Ok(()) => None,
                Err(WireError::ConnectionClosed) => {
                    debug!("connection closed");
                    None
                }
                Err(e) => {
                    error!("receive loop error: {e}");
                    Some(e)
                }
            };
            let _ = shutdown_tx.send(err);
        });

        Self { proto, shutdown_rx }
    }

    async fn listen<H>(proto: &Protocol<C>, handler: &H) -> Result<()>
    where
        H: Fn(Message, PayloadValue),
    {
        loop {
            let (msg, payload) = proto.receive_message().await?;
            handler(msg, payload);
        }
    }

    /// Send a payload with an auto-allocated id; returns the id.
    pub async fn send<P: PayloadEncode + ?Sized>(
        &self,
        message_type: u8,
        payload: &P,
    ) -> Result<u32> {
        self.proto.send(message_type, payload).await
    }

    /// Send a payload with a specific message id.
    pub async fn send_with_id<P: PayloadEncode + ?Sized>(
        &self,
        message_type: u8,
        id: u32,
        payload: &P,
    ) -> Result<()> {
        self.proto.send_message(message_type, id, payload).await
    }

    /// Send pre-serialized bytes with an auto-allocated id.
    pub async fn send_raw(&self, message_type: u8, data: &[u8]) -> Result<u32> {
        self.proto.send_raw(message_type, data).await
    }

    /// The underlying Protocol, for advanced usage.
    pub fn protocol(&self) -> &Arc<Protocol<C>> {
        &self.proto
    }

    /// Close the connection; the receive loop ends shortly after.
    pub async fn close(&self) -> Result<()> {
        self.proto.close().await
    }

    /// Block until the receive loop ends.
    ///
    /// Returns `Ok(())` on a clean close and the terminating error
    /// otherwise.
    pub async fn wait_for_shutdown(self) -> Result<()> {
        match self.shutdown_rx.await {
            Ok(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }
}
