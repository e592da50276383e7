use std::io;
use std::net::SocketAddr;
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::transport::Socket;

/// Plain TCP transport.
#[derive(Debug, Default)]
pub struct PlainSocket {
    stream: Option<TcpStream>,
}

impl PlainSocket {
    /// An unconnected socket, for the client side.
    pub fn new() -> Self {
        Self { stream: None }
    }

    /// Wraps an accepted stream, for the server side.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket is closed"))
    }
}

/// Tries each endpoint in turn and returns the first stream that connects.
pub(crate) async fn connect_tcp(host: &str, endpoints: &[SocketAddr]) -> Result<TcpStream> {
    let mut last_error =
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no endpoints to connect to");

    for addr in endpoints {
        trace!(host, %addr, "Connecting");
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "Failed to set TCP_NODELAY");
                }
                debug!(host, %addr, "Socket connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(host, %addr, error = %e, "Endpoint refused connection");
                last_error = e;
            }
        }
    }

    Err(Error::EndpointConnect {
        host: host.to_string(),
        source: last_error,
    })
}

/// What an idle stream has waiting on it, checked without blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Idle {
    /// Nothing to read yet; the connection looks healthy.
    Quiet,
    /// Bytes arrived that nobody asked for.
    Data,
    /// FIN, reset or another socket error.
    Closed,
}

/// Peeks one byte with a no-op waker so nothing is consumed or awaited.
pub(crate) fn idle_state(stream: &TcpStream) -> Idle {
    let mut cx = Context::from_waker(Waker::noop());
    let mut byte = [0u8; 1];
    let mut buf = ReadBuf::new(&mut byte);
    match stream.poll_peek(&mut cx, &mut buf) {
        Poll::Pending => Idle::Quiet,
        Poll::Ready(Ok(0)) | Poll::Ready(Err(_)) => Idle::Closed,
        Poll::Ready(Ok(_)) => Idle::Data,
    }
}

impl Socket for PlainSocket {
    async fn connect(&mut self, host: &str, endpoints: &[SocketAddr]) -> Result<()> {
        self.stream = Some(connect_tcp(host, endpoints).await?);
        Ok(())
    }

    async fn write(&mut self, buffers: &[&[u8]]) -> Result<usize> {
        let stream = self.stream().map_err(Error::write)?;
        let mut written = 0;
        for buf in buffers {
            stream.write_all(buf).await.map_err(Error::write)?;
            written += buf.len();
        }
        stream.flush().await.map_err(Error::write)?;
        Ok(written)
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream().map_err(Error::read)?;
        stream.read(buf).await.map_err(Error::read)
    }

    async fn shutdown(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        match stream.shutdown().await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotConnected => true,
            Err(e) => {
                warn!(error = %e, "Socket shutdown error");
                false
            }
        }
    }

    fn close(&mut self) -> bool {
        self.stream.take().is_some()
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Unsolicited bytes on an idle plain connection cannot belong to a
    /// future response, so they count as closed too.
    fn peer_closed(&self) -> bool {
        match &self.stream {
            Some(stream) => idle_state(stream) != Idle::Quiet,
            None => true,
        }
    }
}
