//! Transport capabilities - the byte stream and listener interfaces.
//!
//! The framework is transport-agnostic: anything that is an async
//! bidirectional byte stream can carry the protocol. [`Transport`] is
//! blanket-implemented, so `TcpStream`, `UnixStream`, in-memory duplex
//! pipes, and TLS-wrapped streams all qualify without ceremony.
//!
//! [`Listener`] abstracts the server side's accept loop and is
//! implemented for the tokio TCP and Unix listeners.

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

/// A bidirectional byte stream the protocol can run over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Accepts inbound transport connections.
pub trait Listener: Send {
    /// The connection type this listener produces.
    type Conn: Transport + 'static;

    /// Wait for and return the next inbound connection.
    fn accept(&self) -> impl Future<Output = io::Result<Self::Conn>> + Send;
}

impl Listener for TcpListener {
    type Conn = TcpStream;

    async fn accept(&self) -> io::Result<TcpStream> {
        let (stream, _addr) = TcpListener::accept(self).await?;
        Ok(stream)
    }
}

#[cfg(unix)]
impl Listener for UnixListener {
    type Conn = UnixStream;

    async fn accept(&self) -> io::Result<UnixStream> {
        let (stream, _addr) = UnixListener::accept(self).await?;
        Ok(stream)
    }
}
