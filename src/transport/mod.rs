//! Socket transports.
//!
//! A transport exposes the same small capability set whether it runs over
//! plain TCP or TLS, so connections and sessions never care which one they
//! hold. The variant is chosen once, when the transport is created.

pub mod plain;
pub mod tls;

use std::future::Future;
use std::net::SocketAddr;

use crate::error::Result;

pub use plain::PlainSocket;
pub use tls::{TlsRegistry, TlsSocket};

/// Capability set shared by every transport.
///
/// `shutdown` and `close` are separate on purpose: shutdown is the graceful
/// protocol-level goodbye and may fail, close always releases the OS handle.
/// Callers run both on every exit path.
pub trait Socket: Send {
    /// Connects to the first reachable endpoint. `host` is the name the
    /// endpoints were resolved from (used for SNI by TLS).
    fn connect(
        &mut self,
        host: &str,
        endpoints: &[SocketAddr],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Writes every buffer in order, entirely. Returns the bytes written.
    fn write(&mut self, buffers: &[&[u8]]) -> impl Future<Output = Result<usize>> + Send;

    /// Reads whatever is available into `buf`; `Ok(0)` means the peer closed.
    fn read_some(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize>> + Send;

    fn shutdown(&mut self) -> impl Future<Output = bool> + Send;

    /// Releases the OS handle. Returns false if it was already released.
    fn close(&mut self) -> bool;

    fn is_open(&self) -> bool;

    /// Whether an idle transport can no longer carry a request: the peer
    /// sent FIN or reset it, or it was released. Never blocks.
    fn peer_closed(&self) -> bool;
}

/// A plain or TLS transport.
pub enum Transport {
    Plain(PlainSocket),
    Tls(TlsSocket),
}

impl Transport {
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }
}

impl Socket for Transport {
    async fn connect(&mut self, host: &str, endpoints: &[SocketAddr]) -> Result<()> {
        match self {
            Transport::Plain(s) => s.connect(host, endpoints).await,
            Transport::Tls(s) => s.connect(host, endpoints).await,
        }
    }

    async fn write(&mut self, buffers: &[&[u8]]) -> Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buffers).await,
            Transport::Tls(s) => s.write(buffers).await,
        }
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Transport::Plain(s) => s.read_some(buf).await,
            Transport::Tls(s) => s.read_some(buf).await,
        }
    }

    async fn shutdown(&mut self) -> bool {
        match self {
            Transport::Plain(s) => s.shutdown().await,
            Transport::Tls(s) => s.shutdown().await,
        }
    }

    fn close(&mut self) -> bool {
        match self {
            Transport::Plain(s) => s.close(),
            Transport::Tls(s) => s.close(),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Transport::Plain(s) => s.is_open(),
            Transport::Tls(s) => s.is_open(),
        }
    }

    fn peer_closed(&self) -> bool {
        match self {
            Transport::Plain(s) => s.peer_closed(),
            Transport::Tls(s) => s.peer_closed(),
        }
    }
}
