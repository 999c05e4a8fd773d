//! Server - accept loop handing connections to a callback.
//!
//! Thin plumbing over a [`Listener`]: each accepted connection is
//! wrapped in an `Arc<Protocol>` sharing the server's options, and the
//! connection callback runs as its own task. The callback owns the
//! connection's lifecycle, typically driving
//! [`receive_message`](Protocol::receive_message) until it errors.
//!
//! # Example
//!
//! ```ignore
//! use tagwire::{MessageOptions, Server};
//! use tokio::net::TcpListener;
//!
//! let listener = TcpListener::bind("127.0.0.1:7500").await?;
//! let server = Server::new(listener, MessageOptions::new());
//!
//! server
//!     .run(|proto| async move {
//!         while let Ok((msg, _payload)) = proto.receive_message().await {
//!             let _ = proto.send(msg.message_type, &msg.payload).await;
//!         }
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::protocol::wire::MessageOptions;
use crate::protocol::Protocol;
use crate::transport::Listener;

/// Accept-loop server over any [`Listener`].
pub struct Server<L: Listener> {
    listener: L,
    opts: MessageOptions,
}

impl<L: Listener> Server<L> {
    pub fn new(listener: L, opts: MessageOptions) -> Self {
        Self { listener, opts }
    }

    /// Accept connections until the listener fails.
    ///
    /// Each connection's callback future is spawned as its own task; a
    /// panicking or erroring connection does not stop the loop. Abort
    /// the surrounding task to stop the server.
    pub async fn run<F, Fut>(self, on_connection: F) -> Result<()>
    where
        F: Fn(Arc<Protocol<L::Conn>>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        loop {
            let conn = self.listener.accept().await?;
            debug!("accepted connection");

            let proto = Arc::new(Protocol::new(conn, self.opts.clone()));
            tokio::spawn(on_connection(proto));
        }
    }
}
